use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dnsview::config::max_age_from_hours;
use dnsview::engine::DashboardView;
use dnsview::session::{self, Notice, Session, SessionEvent};
use dnsview::source::{CaptureController, HttpSource, RecordSource};
use dnsview::{export, push, serve, Config, DashboardEngine};

#[derive(Parser)]
#[command(name = "dnsview", about = "Live DNS traffic dashboard for a capture backend")]
struct Cli {
    /// Capture backend base URL
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    page_size: Option<usize>,
    /// Number of domains in the top list
    #[arg(long)]
    top: Option<usize>,
    #[arg(long)]
    refresh_secs: Option<u64>,
    /// Drop records older than this many hours
    #[arg(long)]
    max_age_hours: Option<u64>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List capture interfaces
    Interfaces,
    Start { interface: String },
    Stop,
    /// Follow live traffic
    Watch {
        /// Start capture on this interface first
        #[arg(long)]
        interface: Option<String>,
        /// Serve the read-only view API on this address
        #[arg(long)]
        serve: Option<SocketAddr>,
        #[arg(long)]
        ip: Option<String>,
        /// Domains to hide
        #[arg(long)]
        hide: Vec<String>,
    },
    /// Write one page of rows as JSON
    ExportPage {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        hide: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Save the backend's full export
    ExportFull {
        #[arg(long)]
        out: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if let Some(size) = cli.page_size {
        config.page_size = size;
    }
    if let Some(n) = cli.top {
        config.top_n = n;
    }
    if let Some(secs) = cli.refresh_secs {
        config.refresh_interval = std::time::Duration::from_secs(secs);
    }
    if let Some(hours) = cli.max_age_hours {
        config.max_age = Some(max_age_from_hours(hours)?);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let source = HttpSource::new(&config.server_url);

    match cli.command {
        Cmd::Interfaces => {
            for iface in source.list_interfaces().await? {
                match iface.description {
                    Some(description) => println!("{}\t{}", iface.name, description),
                    None => println!("{}", iface.name),
                }
            }
        }
        Cmd::Start { interface } => {
            source.start_capture(&interface).await?;
            println!("Capture started on {}", interface);
        }
        Cmd::Stop => {
            source.stop_capture().await?;
            println!("Capture stopped");
        }
        Cmd::Watch { interface, serve, ip, hide } => {
            if let Some(interface) = interface {
                source.start_capture(&interface).await?;
                println!("Capture started on {}", interface);
            }
            watch(config, source, serve, ip, hide).await?;
        }
        Cmd::ExportPage { page, ip, hide, out } => {
            let mut engine = DashboardEngine::new(&config)?;
            engine.replace_all(source.history().await?);
            apply_filters(&mut engine, ip, &hide);
            engine.go_to_page(page);
            let json = serde_json::to_string_pretty(&engine.export_page())?;
            match out {
                Some(path) => tokio::fs::write(path, json).await?,
                None => println!("{}", json),
            }
        }
        Cmd::ExportFull { out } => {
            let bytes = export::full_history(&source).await?;
            tokio::fs::write(&out, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
    }
    Ok(())
}

fn apply_filters(engine: &mut DashboardEngine, ip: Option<String>, hide: &[String]) {
    for domain in hide {
        engine.set_domain(domain, true);
    }
    if !hide.is_empty() {
        engine.save_selection();
    }
    engine.drill_down(ip);
}

async fn watch(
    config: Config,
    source: HttpSource,
    serve_addr: Option<SocketAddr>,
    ip: Option<String>,
    hide: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let mut engine = DashboardEngine::new(&config)?;
    apply_filters(&mut engine, ip, &hide);

    let (session, handle, events) = Session::new(engine, Arc::new(source), config.max_age);

    let running_clone = running.clone();
    let shutdown = handle.events.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
        let _ = shutdown.send(SessionEvent::Shutdown);
    })?;

    session::spawn_refresh_timer(handle.events.clone(), config.refresh_interval, running.clone());
    tokio::spawn(push::run(
        config.push_url(),
        handle.events.clone(),
        running.clone(),
        config.reconnect_delay,
    ));

    if let Some(addr) = serve_addr {
        let views = handle.views.clone();
        tokio::spawn(async move {
            if let Err(e) = serve::serve(addr, views).await {
                eprintln!("View server error: {}", e);
            }
        });
    }

    let notices = handle.notices.clone();
    thread::spawn(move || {
        for notice in notices {
            match notice {
                Notice::SourceUnavailable(reason) => eprintln!("Source unavailable: {}", reason),
                Notice::InvalidRecord(reason) => eprintln!("Dropped record: {}", reason),
                Notice::Refreshed(report) if report.rejected > 0 => {
                    eprintln!("Refreshed, {} invalid records dropped", report.rejected)
                }
                Notice::Pruned(n) => println!("Pruned {} old records", n),
                Notice::Cleared => println!("Log cleared"),
                _ => {}
            }
        }
    });

    let mut views = handle.views.clone();
    let running_clone = running.clone();
    tokio::spawn(async move {
        while running_clone.load(Ordering::SeqCst) && views.changed().await.is_ok() {
            let view = views.borrow().clone();
            print_summary(&view);
        }
    });

    session.run(events, running).await;
    Ok(())
}

fn print_summary(view: &DashboardView) {
    if view.is_empty() {
        println!("No data yet");
        return;
    }
    println!(
        "{} records ({}/{} buffered), {} domains, {} devices, {} bytes",
        view.subset_len,
        view.usage.len,
        view.usage.capacity,
        view.stats.domains().len(),
        view.stats.unique_devices(),
        view.stats.total_bytes,
    );
    for entry in &view.top.entries {
        println!(
            "  {:>3}%  {:>6}  {}  ({})",
            entry.share, entry.request_count, entry.domain, entry.ip
        );
    }
    println!("  page {}/{}", view.page.number, view.page.total_pages);
}
