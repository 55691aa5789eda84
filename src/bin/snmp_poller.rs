//! snmp-poller: query, walk, and sample SNMP agents from the command line.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use snmp_poller::agent::{AgentRunner, ChannelReporter, Report, SyncFetcher};
use snmp_poller::cli::args::{AgentArgs, Cli, Command};
use snmp_poller::cli::output::{format_graph, write_error, write_report};
use snmp_poller::sampling::SamplingFeed;
use snmp_poller::{AgentProfile, ProfileStore, Session, Target};

const POLL_GRAPH: &str = "poll";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    cli.output.init_tracing();

    let mut store = match cli.agent.store() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let profile = match cli.agent.resolve_profile(&store) {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Profiles { save, remove } => run_profiles(&mut store, profile, save, remove),
        Command::Poll {
            ticks,
            interval,
            oids,
        } => run_poll(&cli.agent, profile, ticks, interval, &oids).await,
        command => run_query(&cli.agent, profile, command).await,
    }
}

async fn run_query(args: &AgentArgs, profile: AgentProfile, command: Command) -> ExitCode {
    let target = match Target::from_profile(profile.version, &profile, false) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let session = match Session::udp_for(&target).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let retry = args.retry(&profile);
    let (reporter, mut reports) = ChannelReporter::new();
    let (mut runner, agent) = AgentRunner::new(session, profile, reporter);
    if let Some(retry) = retry {
        runner = runner.with_retry(retry);
    }

    match command {
        Command::Get { oid } => agent.get_from(oid),
        Command::GetNext { oid } => agent.get_next_from(oid),
        Command::Set {
            oid,
            value_type,
            value,
        } => agent.set_from(oid, value, value_type.into()),
        Command::Walk { oid } => agent.walk_from(oid),
        Command::Table { oid } => agent.table_view_from(oid),
        Command::Poll { .. } | Command::Profiles { .. } => unreachable!("handled by main"),
    }
    // The runner finishes once the last handle is gone and nothing is in flight.
    drop(agent);

    let printer = async {
        let mut failed = false;
        while let Some(report) = reports.recv().await {
            failed |= matches!(report, Report::Error(_));
            let mut stdout = io::stdout();
            if let Err(e) = write_report(&mut stdout, &report).and_then(|_| stdout.flush()) {
                write_error(&e.to_string());
                failed = true;
            }
        }
        failed
    };

    let ((), failed) = tokio::join!(
        async {
            drop(runner.run().await);
        },
        printer
    );

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_poll(
    args: &AgentArgs,
    profile: AgentProfile,
    ticks: u32,
    interval: f64,
    oids: &[String],
) -> ExitCode {
    let interval = match Duration::try_from_secs_f64(interval) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            eprintln!("Error: interval must be a positive number of seconds");
            return ExitCode::FAILURE;
        }
    };
    if ticks == 0 {
        return ExitCode::SUCCESS;
    }

    let mut target = match Target::from_profile(profile.version, &profile, false) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(retry) = args.retry(&profile) {
        target = target.with_retry(retry);
    }
    let session = match Session::udp_for(&target).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut feed = SamplingFeed::with_interval(SyncFetcher::new(session, target), interval);
    if let Err(e) = feed.create_graph(POLL_GRAPH) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    for oid in oids {
        if let Err(e) = feed.add_curve(POLL_GRAPH, oid, oid) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let last_tick = u64::from(ticks) - 1;
    let done = |feed: &SamplingFeed<_>| {
        feed.snapshot(POLL_GRAPH).is_some_and(|graph| {
            graph
                .curves
                .iter()
                .all(|c| c.samples.last().is_some_and(|s| s.tick >= last_tick))
        })
    };
    while !done(&feed) {
        tokio::time::sleep(interval / 4).await;
    }

    let Some(graph) = feed.snapshot(POLL_GRAPH) else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = feed.delete_graph(POLL_GRAPH) {
        tracing::warn!(target: "snmp_poller::cli", error = %e, "failed to stop sampling");
    }

    print!("{}", format_graph(&graph));

    let any_valid = graph
        .curves
        .iter()
        .any(|c| c.samples.iter().any(|s| s.value.is_some()));
    if any_valid {
        ExitCode::SUCCESS
    } else {
        eprintln!("Error: no valid samples received from {}", graph.name);
        ExitCode::FAILURE
    }
}

fn run_profiles(
    store: &mut ProfileStore,
    mut profile: AgentProfile,
    save: Option<String>,
    remove: Option<String>,
) -> ExitCode {
    let result = if let Some(name) = save {
        profile.name = name.clone();
        store.insert(profile);
        store
            .save()
            .map(|()| println!("saved profile '{}' to {}", name, store.path().display()))
    } else if let Some(name) = remove {
        if store.remove(&name).is_none() {
            eprintln!("Error: no stored profile named '{}'", name);
            return ExitCode::FAILURE;
        }
        store
            .save()
            .map(|()| println!("removed profile '{}'", name))
    } else {
        for name in store.names() {
            if let Some(p) = store.get(name) {
                println!("{}\t{}:{}\t{}", name, p.address, p.port, p.version);
            }
        }
        Ok(())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
