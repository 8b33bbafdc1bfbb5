mod app;
mod autoexit;
mod buffer;
mod cache;
mod cli;
mod error;
mod event;
mod exec;
mod host;
mod input;
mod layout;
mod log;
mod phase;
mod ssh;
mod stats;
mod summary;
mod text;
mod ui;

use std::io::{stdout, IsTerminal, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;
use crossterm::event::{Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::CrosstermBackend;
use ratatui::Terminal;

use app::App;
use autoexit::AutoExit;
use cache::TimingCache;
use cli::Cli;
use event::event_channel;
use exec::{Executor, ExecutorConfig, DEFAULT_BUILD_TIMEOUT, DEFAULT_IDLE_TIMEOUT};
use input::Action;
use ssh::DEFAULT_CONNECT_TIMEOUT;
use summary::generate_summary;
use ui::theme::Theme;

const TICK: Duration = Duration::from_millis(100);
const AGENT_SCRIPT: &str = include_str!("../agent/build-agent.sh");

fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            2
        }
    };
    if debug {
        if let Err(e) = log::dump_to_file(Path::new("debug.log")) {
            eprintln!("could not write debug.log: {}", e);
        }
    }
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let hosts = cli::collect_hosts(&cli)?;
    if !cli.tarball.is_file() {
        bail!("tarball not found: {}", cli.tarball.display());
    }

    if hosts.is_empty() {
        println!("{}", generate_summary(&[], Duration::ZERO));
        return Ok(0);
    }

    if !stdout().is_terminal() {
        bail!("an interactive terminal (TTY) is required");
    }

    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let max_concurrent = cli
        .max_concurrent
        .unwrap_or_else(|| cli::derive_max_concurrent(height))
        .max(1);

    let cache = if cli.no_cache {
        TimingCache::disabled()
    } else {
        TimingCache::load(
            cli.cache_file
                .clone()
                .unwrap_or_else(cli::default_cache_file),
            cli.cache_retention,
            cli.cache_keep_builds,
        )
    };

    let theme = Theme::new(cli::color_enabled(
        cli.color,
        true,
        std::env::var("TERM").ok().as_deref(),
    ));

    let (sink, events) = event_channel();
    let mut executor = Executor::new(
        ExecutorConfig {
            max_concurrent,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            tarball: cli.tarball.clone(),
            agent_script: AGENT_SCRIPT.to_string(),
        },
        sink,
    );
    for host in &hosts {
        executor.enqueue(host.clone());
    }

    let autoexit = AutoExit::new(
        Duration::from_secs(cli.auto_exit_delay),
        !cli.no_auto_exit,
    );
    let show_progress = !cli.no_progress && !cli.no_cache;

    let mut app = App::new(hosts, executor, events, cache, autoexit, theme, show_progress);
    app.set_term_size(width, height);
    app.start();

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let loop_result = run_loop(&mut terminal, &mut app);

    let _ = disable_raw_mode();
    if !app.is_plain_mode() {
        let _ = stdout().execute(LeaveAlternateScreen);
    }

    app.shutdown();

    let now = Instant::now();
    println!(
        "{}",
        generate_summary(&app.outcomes(now), app.total_elapsed(now))
    );

    loop_result?;
    Ok(app.exit_code())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut force_redraw = true;

    while !app.should_quit() {
        let frame_start = Instant::now();

        let mut dirty = app.drain_events();
        if app.tick(Instant::now()) {
            dirty = true;
        }

        while crossterm::event::poll(Duration::from_millis(0))? {
            let ev = crossterm::event::read()?;
            if let Event::Resize(w, h) = ev {
                app.set_term_size(w, h);
                force_redraw = true;
                dirty = true;
            }
            if let Event::Key(key) = &ev {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
            }
            let action = input::handle_event(&ev, app.nav_mode());
            if action != Action::None {
                app.handle_action(action);
                dirty = true;
            }
            if app.should_quit() {
                return Ok(());
            }
        }

        if app.is_plain_mode() {
            flush_plain_notes(app);
        } else if dirty || force_redraw {
            if force_redraw {
                terminal.clear()?;
            }
            let layout = app.grid_layout();
            let now = Instant::now();
            if let Err(err) = terminal.draw(|f| ui::render(f, app, &layout, now)) {
                crate::tlog!(error, "render failed ({}), falling back to plain output", err);
                let _ = stdout().execute(LeaveAlternateScreen);
                app.enter_plain_mode();
                print!("rendering failed ({}); continuing in plain mode\r\n", err);
                let _ = stdout().flush();
            }
            force_redraw = false;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < TICK {
            std::thread::sleep(TICK - elapsed);
        }
    }
    Ok(())
}

/// Raw mode is still active in the fallback, so lines end with CRLF.
fn flush_plain_notes(app: &mut App) {
    let notes = app.take_plain_notes();
    if notes.is_empty() {
        return;
    }
    let mut out = stdout();
    for note in notes {
        let _ = write!(out, "{}\r\n", note);
    }
    let _ = out.flush();
}
