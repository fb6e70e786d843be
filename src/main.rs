//! hayes - AT Modem Emulator
//!
//! This is the main entry point for the modem emulator. It listens on TCP,
//! runs an AT session per client and registers a small set of demo commands.

use clap::Parser;
use hayes::commands::{CommandHandler, HandlerRegistry};
use hayes::config::{AtServerConfig, DEFAULT_LOG_CATEGORY, DEFAULT_STREAM_TIMEOUT};
use hayes::connection::handle_connection;
use hayes::protocol::{CommandTerminator, CommandType, FinalResponse, DEFAULT_BUFFER_CAPACITY};
use hayes::server::ServerStats;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Baud rates accepted by AT+IPR
const SUPPORTED_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// hayes command-line options
#[derive(Parser, Debug)]
#[command(
    name = "hayes",
    version,
    about = "AT command modem emulator",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = hayes::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = hayes::DEFAULT_PORT)]
    port: u16,

    /// Terminator written around response lines (cr, lf, crlf)
    #[arg(long, default_value = "crlf")]
    terminator: CommandTerminator,

    /// Read window and write timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_STREAM_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Do not echo received bytes
    #[arg(long)]
    no_echo: bool,

    /// Do not log command and response lines
    #[arg(long)]
    no_log: bool,

    /// Category attached to command and response log lines
    #[arg(long, default_value = DEFAULT_LOG_CATEGORY)]
    log_category: String,

    /// Longest accepted command line in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,
}

impl Args {
    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn server_config(&self) -> AtServerConfig {
        AtServerConfig::new()
            .command_terminator(self.terminator)
            .stream_timeout(Duration::from_millis(self.timeout_ms))
            .echo_enabled(!self.no_echo)
            .log_enabled(!self.no_log)
            .log_category(self.log_category.clone())
            .buffer_capacity(self.buffer_capacity)
    }
}

fn print_banner(args: &Args) {
    println!(
        r#"
   _
  | |__   __ _ _   _  ___  ___
  | '_ \ / _` | | | |/ _ \/ __|
  | | | | (_| | |_| |  __/\__ \
  |_| |_|\__,_|\__, |\___||___/
               |___/

hayes v{} - AT Command Modem Emulator
──────────────────────────────────────────────────────────────
Listening on {}
Try: nc {} {}   then type AT, ATI, AT+CSQ, ATD123 (+++ to escape)

Use Ctrl+C to shutdown gracefully.
"#,
        hayes::VERSION,
        args.bind_address(),
        args.host,
        args.port
    );
}

/// Builds the demo command set shared by all sessions.
fn demo_registry() -> anyhow::Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.add(CommandHandler::with_static_response(
        CommandType::Exec,
        "I",
        "hayes AT modem emulator",
    ))?;
    registry.add(CommandHandler::with_response(
        CommandType::Exec,
        "+GMR",
        format!("hayes {}", hayes::VERSION),
    ))?;

    registry.add(CommandHandler::new(CommandType::Exec, "+CSQ", |req, _, _| {
        req.send_response(format_args!("+CSQ: {},{}", 20, 5))?;
        Ok(())
    }))?;
    registry.add(CommandHandler::with_static_response(
        CommandType::Test,
        "+CSQ",
        "+CSQ: (0-31,99),(0-7,99)",
    ))?;

    let rate = Arc::new(AtomicU32::new(115200));
    registry.add(CommandHandler::new(CommandType::Read, "+IPR", {
        let rate = Arc::clone(&rate);
        move |req, _, _| {
            req.send_response(format_args!("+IPR: {}", rate.load(Ordering::Relaxed)))?;
            Ok(())
        }
    }))?;
    registry.add(CommandHandler::new(CommandType::Write, "+IPR", move |req, _, _| {
        let values = req.scan("%u");
        let requested = values
            .first()
            .and_then(|v| v.as_uint())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| anyhow::anyhow!("missing baud rate"))?;
        if !SUPPORTED_RATES.contains(&requested) {
            anyhow::bail!("unsupported baud rate {}", requested);
        }
        rate.store(requested, Ordering::Relaxed);
        Ok(())
    }))?;
    registry.add(CommandHandler::new(CommandType::Test, "+IPR", |req, _, _| {
        let rates: Vec<String> = SUPPORTED_RATES.iter().map(u32::to_string).collect();
        req.send_response(format_args!("+IPR: (),({})", rates.join(",")))?;
        Ok(())
    }))?;

    // ATZ and ATZ<n> restore a profile; there is only one
    registry.add(CommandHandler::new(CommandType::Exec, "Z", |_, _, _| Ok(())))?;
    registry.add(CommandHandler::new(CommandType::OneIntArg, "Z", |req, _, _| {
        let profile: i32 = req.read().trim().parse()?;
        if profile != 0 {
            req.set_final_response(FinalResponse::Error);
        }
        Ok(())
    }))?;

    // Already on hook
    registry.add(CommandHandler::new(CommandType::Exec, "H", |_, _, _| Ok(())))?;

    registry.add(CommandHandler::new(CommandType::Wildcard, "D", |req, _, _| {
        let number = req.read().into_owned();
        if number.trim().is_empty() {
            req.set_final_response(FinalResponse::NoDialtone);
            return Ok(());
        }
        info!(number = %number, "Dialing");
        req.set_final_response(FinalResponse::Connect);
        req.suspend();
        Ok(())
    }))?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = args.server_config();
    config.validate()?;

    // Print the banner
    print_banner(&args);

    let registry = demo_registry()?;
    info!(commands = registry.len(), "Command handlers registered");

    let stats = Arc::new(ServerStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(args.bind_address()).await?;
    info!("Listening on {}", args.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, config, registry, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let snapshot = stats.snapshot();
    info!(
        sessions = snapshot.sessions_opened,
        lines = snapshot.lines_processed,
        failures = snapshot.handler_failures,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    config: AtServerConfig,
    registry: HandlerRegistry,
    stats: Arc<ServerStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let config = config.clone();
                let registry = registry.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, config, registry, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
