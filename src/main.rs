// nmtview: replay a virtual memory trace and browse the result

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use nmtview::constants::DEFAULT_SNAPSHOT_LIMIT;
use nmtview::trace::{parse_number, parse_trace, Session};
use nmtview::ui::App;
use nmtview::view::report::Scale;
use nmtview::view::NmtMode;

/// Command-line options
struct Options {
    trace_path: String,
    scale: Scale,
    mode: NmtMode,
    print: bool,
    space: Option<String>,
    snapshot_limit: usize,
}

fn usage(program_name: &str) {
    eprintln!("Usage: {} [options] <trace>", program_name);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scale <B|KB|MB|GB>      Unit for reported sizes (default KB)");
    eprintln!("  --summary                 Track totals only, no call stacks");
    eprintln!("  --print                   Write the report to stdout instead of the TUI");
    eprintln!("  --space <name>            Space shown first in the TUI");
    eprintln!("  --snapshot-limit <bytes>  Memory budget for the step history");
    eprintln!();
    eprintln!("Set RUST_LOG=debug to log every replayed event.");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut trace_path = None;
    let mut options = Options {
        trace_path: String::new(),
        scale: Scale::default(),
        mode: NmtMode::Detail,
        print: false,
        space: None,
        snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--scale" => {
                let value = iter.next().ok_or("--scale needs a value")?;
                options.scale = value.parse()?;
            }
            "--summary" => options.mode = NmtMode::Summary,
            "--print" => options.print = true,
            "--space" => {
                let value = iter.next().ok_or("--space needs a value")?;
                options.space = Some(value.clone());
            }
            "--snapshot-limit" => {
                let value = iter.next().ok_or("--snapshot-limit needs a value")?;
                let limit = parse_number(value)
                    .ok_or_else(|| format!("Invalid snapshot limit '{}'", value))?;
                options.snapshot_limit = usize::try_from(limit)
                    .map_err(|_| format!("Snapshot limit '{}' is too large", value))?;
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown option '{}'", flag)),
            path => {
                if trace_path.is_some() {
                    return Err(format!("Unexpected argument '{}'", path));
                }
                trace_path = Some(path.to_string());
            }
        }
    }

    options.trace_path = trace_path.ok_or("No trace file provided")?;
    Ok(options)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("nmtview");

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            usage(program_name);
            std::process::exit(1);
        }
    };

    if !Path::new(&options.trace_path).exists() {
        eprintln!("Error: File '{}' not found", options.trace_path);
        std::process::exit(1);
    }

    let source = fs::read_to_string(&options.trace_path)?;

    eprintln!("Parsing {}...", options.trace_path);
    let trace = match parse_trace(&source) {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    eprintln!("Parsed {} event(s).", trace.len());

    let mut session = match Session::new(trace, options.mode, options.snapshot_limit) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Replaying trace...");
    match session.run() {
        Ok(()) => {
            eprintln!("Replay completed successfully.");
            let (used, limit) = session.history_memory();
            eprintln!(
                "Total snapshots: {} ({} of {} bytes of history)",
                session.total_snapshots(),
                used,
                limit
            );
        }
        Err(e) => {
            eprintln!("Replay error: {}", e);
            if options.print {
                eprintln!("Reporting state after {} event(s)...", session.executed());
            } else {
                eprintln!("Entering TUI with partial replay history...");
            }
        }
    }

    if options.print {
        let view = session.view();
        let mut stdout = io::stdout().lock();
        view.report(&mut stdout, options.scale)?;
        for (space, name) in view.spaces() {
            let summary = view.summary_snapshot(space);
            writeln!(stdout)?;
            writeln!(stdout, "Summary of space '{}':", name)?;
            for row in &summary.rows {
                writeln!(
                    stdout,
                    "    {:<24} reserved={} committed={} (peak reserved={} committed={})",
                    row.tag.name(),
                    options.scale.format(row.reserved),
                    options.scale.format(row.committed),
                    options.scale.format(row.peak_reserved),
                    options.scale.format(row.peak_committed),
                )?;
            }
        }
        return Ok(());
    }

    session.rewind_to_start();

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session, options.scale, options.space.as_deref());
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
