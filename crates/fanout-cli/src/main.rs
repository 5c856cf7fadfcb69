mod args;
mod banner;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::Parser;
use fanout_exec::{Console, RunConfig, Scheduler, SshLauncher, util::login_user};
use fanout_model::HostList;
use fanout_observe::logger_init;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    args::Cli,
    banner::{Banner, check_out_dir},
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logger_init(&cli.logger_config()) {
        eprintln!("fanout: logging disabled: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fanout: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = cli.run_config()?;
    let user = match &cli.user {
        Some(user) => user.clone(),
        None => login_user().context("cannot determine the login user; pass -u")?,
    };

    let hosts = cli.loader(&user).load(&cli.host_source())?;
    if let Some(dir) = &cfg.out_dir {
        check_out_dir(dir)?;
    }

    // The supervising loop is single-threaded; clients run as separate processes.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start the async runtime")?;
    runtime.block_on(execute(cfg, hosts, &user, cli.label.as_deref()))
}

async fn execute(cfg: RunConfig, hosts: HostList, user: &str, label: Option<&str>) -> anyhow::Result<()> {
    let banner = Banner {
        cfg: &cfg,
        hosts: hosts.len(),
        parallel: cfg.effective_parallel(hosts.len()),
        user,
        label,
    }
    .to_string();

    let launcher = Arc::new(SshLauncher::from_config(&cfg));
    let mut scheduler = Scheduler::new(cfg, launcher, Console::stdio())?;
    scheduler.notice(&banner);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => on_interrupt.cancel(),
            Err(e) => debug!(target: "fanout.cli", error = %e, "cannot listen for ctrl-c"),
        }
    });

    let report = scheduler.run(&hosts, cancel).await?;
    if report.cancelled {
        warn!(
            target: "fanout.cli",
            processed = report.processed,
            not_started = report.not_started,
            "run interrupted"
        );
    }
    Ok(())
}
