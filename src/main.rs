use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crime_dashboard::app::App;
use crime_dashboard::client::ApiClient;
use crime_dashboard::config::{Cli, Command as CliCommand};
use crime_dashboard::controller::{Command, Controller};
use crime_dashboard::derive::SelectionFallback;
use crime_dashboard::service::{CrimeApi, CrimeService};
use crime_dashboard::state::DashboardState;
use crime_dashboard::{basemap, cli, ui};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream};
use crossterm::execute;
use futures::StreamExt;
use ratatui::DefaultTerminal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let args = Cli::parse();
    let client = ApiClient::new(&args.api_url, args.timeout()).context("configuring the API client")?;
    let api: Arc<dyn CrimeApi> = Arc::new(CrimeService::new(client));
    let mut out = io::stdout();

    match args.command {
        None => run_dashboard(api, &args.api_url, args.selection_fallback, None, None).await,
        Some(CliCommand::Dashboard { basemap, file }) => {
            run_dashboard(
                api,
                &args.api_url,
                args.selection_fallback,
                basemap.as_deref(),
                file.as_deref(),
            )
            .await
        }
        Some(CliCommand::List { search, limit }) => {
            cli::list(api.as_ref(), &mut out, search.as_deref(), limit).await
        }
        Some(CliCommand::Stats) => cli::stats(api.as_ref(), &mut out).await,
        Some(CliCommand::Show { bairro }) => cli::show(api.as_ref(), &mut out, &bairro).await,
        Some(CliCommand::Upload { file }) => cli::upload(api.as_ref(), &mut out, &file).await,
        Some(CliCommand::Clear { yes }) => cli::clear(api.as_ref(), &mut out, yes).await,
        Some(CliCommand::Health) => cli::health(api.as_ref(), &mut out).await,
    }
}

async fn run_dashboard(
    api: Arc<dyn CrimeApi>,
    api_url: &str,
    fallback: SelectionFallback,
    basemap_path: Option<&Path>,
    file: Option<&Path>,
) -> Result<()> {
    let mut state = DashboardState::new(fallback);
    if let Some(path) = file {
        if let Err(e) = state.choose_file(path) {
            log::warn!("Ignoring --file: {e}");
        }
    }

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, api, api_url, state, basemap_path).await;

    // Disable mouse capture and restore terminal
    let _ = execute!(io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

async fn run(
    terminal: &mut DefaultTerminal,
    api: Arc<dyn CrimeApi>,
    api_url: &str,
    state: DashboardState,
    basemap_path: Option<&Path>,
) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(state, api_url, size.width, size.height);
    if let Some(path) = basemap_path {
        basemap::load_basemap_or_warn(&mut app.map_renderer, path);
    }

    let (controller, mut outcomes) = Controller::channel(api);
    controller.dispatch(&mut app.state, Command::Refresh);

    let mut events = EventStream::new();

    // Main loop: redraw after every terminal event or finished request
    while !app.should_quit {
        app.sync_view();
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            Some(outcome) = outcomes.recv() => controller.apply(&mut app.state, outcome),
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    if let Some(command) = app.handle_key(key) {
                        controller.dispatch(&mut app.state, command);
                    }
                }
                Some(Ok(Event::Mouse(mouse))) => app.handle_mouse(mouse),
                Some(Ok(Event::Resize(width, height))) => app.resize(width, height),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("reading terminal events"),
                None => break,
            },
        }
    }

    Ok(())
}
