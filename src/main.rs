mod config;
mod config_watch;
mod gate;
mod host_util;
mod http;
mod trusted_hosts;

use std::collections::HashMap;

use log::{debug, error};
use tokio::runtime::Builder;

use gate::Gate;
use trusted_hosts::TrustedHosts;

fn print_usage() {
    eprintln!("usage: hostgate <config>...");
    eprintln!("       hostgate --check <config> <candidate>...");
    eprintln!();
    eprintln!("Serves one admission gate per config entry, or with --check,");
    eprintln!("prints a trusted/untrusted verdict for each candidate host or");
    eprintln!("URL against the first gate in the config.");
}

fn main() {
    env_logger::init();

    let mut check_mode = false;
    let mut args = vec![];
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => check_mode = true,
            "-h" | "--help" => {
                print_usage();
                return;
            }
            _ => args.push(arg),
        }
    }

    if args.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    let num_threads = std::cmp::max(
        2,
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    );

    let runtime = Builder::new_multi_thread()
        .worker_threads(num_threads)
        .enable_io()
        .enable_time()
        .build()
        .expect("Could not build tokio runtime");

    let result = if check_mode {
        runtime.block_on(run_checks(args))
    } else {
        runtime.block_on(run_gates(args))
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run_checks(args: Vec<String>) -> std::io::Result<()> {
    let mut args = args.into_iter();
    let config_path = args.next().expect("args is not empty");
    let candidates: Vec<String> = args.collect();
    if candidates.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no candidate hosts to check",
        ));
    }

    let gate_configs = config::load_gate_configs(&[config_path]).await?;
    let gate_config = gate_configs.first().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "config file contains no gates",
        )
    })?;
    let trusted = TrustedHosts::from_config(gate_config);

    let mut all_trusted = true;
    for candidate in candidates {
        let verdict = if candidate.contains("://") {
            trusted.is_trusted_url(&candidate)
        } else {
            trusted.is_trusted_domain(&candidate)
        };
        println!(
            "{}: {}",
            candidate,
            if verdict { "trusted" } else { "untrusted" }
        );
        all_trusted &= verdict;
    }

    if !all_trusted {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_gates(config_paths: Vec<String>) -> std::io::Result<()> {
    let gate_configs = config::load_gate_configs(&config_paths).await?;
    if gate_configs.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no gate configs found",
        ));
    }

    debug!("Loaded gate configs: {:#?}", &gate_configs);

    let mut gates = vec![];
    let mut shared_trusted_hosts = HashMap::new();
    for gate_config in gate_configs.iter() {
        let gate = Gate::new(gate_config)?;
        shared_trusted_hosts.insert(gate_config.bind_address, gate.trusted_hosts());
        gates.push(gate);
    }

    config_watch::spawn(config_paths, shared_trusted_hosts);

    let last_gate = gates.pop().expect("gate configs is not empty");
    for gate in gates {
        tokio::spawn(async move {
            if let Err(e) = gate.run().await {
                error!("Gate failed: {}", e);
            }
        });
    }
    last_gate.run().await
}
