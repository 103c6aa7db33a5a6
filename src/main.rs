use anyhow::{bail, Context};
use clap::Parser;
use pdi_common::catalog::item_count;
use pdi_common::catalog_for;
use pdi_inspect::api::ApiClient;
use pdi_inspect::search::ChassisSearch;
use pdi_inspect::workflow::{InspectionScript, Session};
use pdi_inspect::{cli, config, error, prompt};
use cli::{Cli, Commands};
use config::Config;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pdi_inspect=debug,pdi_common=debug"
    } else {
        "pdi_inspect=info,pdi_common=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::Login { username } => {
            let password = prompt::ask_password("Password")?;
            let api = ApiClient::new(&config)?;
            let res = api.login(&username, &password).await?;
            let name = res.username.unwrap_or(username);
            config.set_session(name.clone(), res.token);
            config.save()?;
            println!("✔ Logged in as {}", name);
        }

        Commands::Logout => {
            config.clear_session();
            config.save()?;
            println!("✔ Logged out");
        }

        Commands::Config { api_url, show } => {
            if let Some(url) = api_url {
                config.api_base_url = url;
                config.save()?;
                println!("✔ API URL set");
            }

            if show {
                println!("Settings:");
                println!("  API URL: {}", config.api_base_url);
                println!("  User: {}", config.username.as_deref().unwrap_or("(not logged in)"));
                println!("  Timeout: {}s", config.timeout_seconds);
                println!(
                    "  Search: {} ms debounce, {} chars minimum",
                    config.search_debounce_ms, config.search_min_chars
                );
            }
        }

        Commands::Catalog { variant } => {
            let catalog = catalog_for(&variant);
            println!("📋 {} checklist ({} items)\n", variant.to_uppercase(), item_count(&catalog));
            for (section, items) in &catalog {
                println!("{}. {}", section, section.title());
                for item in items {
                    let marker = if item.requires_measurement() { " (reading)" } else { "" };
                    println!("  {:>4}  {}{}", item.id, item.name, marker);
                }
            }
        }

        Commands::Search { query, watch } => {
            config.token()?;
            let api = Arc::new(ApiClient::new(&config)?);
            let mut search = ChassisSearch::from_config(api, &config);

            if let Some(q) = query {
                if search.input(&q).is_none() {
                    bail!("Enter at least {} characters", config.search_min_chars);
                }
                if let Some(outcome) = search.next_result().await {
                    print_matches(outcome.result?);
                }
            }

            if watch {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                loop {
                    tokio::select! {
                        line = lines.next_line() => {
                            let Some(line) = line? else { break };
                            search.input(&line);
                        }
                        Some(outcome) = search.next_result() => {
                            println!("── {}", outcome.query);
                            match outcome.result {
                                Ok(rows) => print_matches(rows),
                                Err(e) => eprintln!("  search failed: {}", e),
                            }
                        }
                    }
                }
            }
        }

        Commands::Inspect { chassis, script, override_existing, dry_run, supervisor } => {
            let api = ApiClient::new(&config)?;
            let mut session = Session::new(api, config.username()?);
            let scope = session.api().scope().clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    scope.cancel();
                }
            });

            println!("🚗 pdi - Inspection\n");

            println!("[1/4] Looking up {}...", chassis);
            let lookup = session.lookup(&chassis).await?;
            let info = &lookup.info;
            println!("✔ {} {} ({}), engine {}\n", info.model, info.variant, info.colour_code, info.engine_no);

            let password = if lookup.job_card_exists {
                if !override_existing {
                    return Err(error::PdiError::JobCardExists(info.chassis_no.clone()).into());
                }
                println!("A job card already exists for {}", info.chassis_no);
                Some(prompt::ask_password("Password to override")?)
            } else {
                None
            };
            session.start_inspection(lookup, password.as_deref()).await?;

            println!("[2/4] Checklist");
            let complete = match script {
                Some(path) => {
                    let script = InspectionScript::load(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let applied = script.apply(session.context_mut())?;
                    println!("✔ {} action(s) applied", applied);
                    session.context().checklist().is_complete()
                }
                None => prompt::run_checklist(session.context_mut())?,
            };
            let (resolved, total) = session.context().checklist().progress();
            if !complete {
                for item in session.context().checklist().pending_items() {
                    println!("  open: {}. {}", item.section, item.name);
                }
                session.teardown();
                bail!("Checklist incomplete ({}/{} resolved)", resolved, total);
            }
            println!("✔ {}/{} items resolved\n", resolved, total);

            println!("[3/4] Supervisor");
            let supervisors = loop {
                match session.supervisors().await {
                    Ok(list) => break list,
                    Err(e) => {
                        if !prompt::offer_retry(&e) {
                            session.teardown();
                            return Err(e.into());
                        }
                    }
                }
            };
            let chosen = match supervisor {
                Some(name) => supervisors
                    .iter()
                    .find(|u| u.username == name)
                    .with_context(|| format!("{} is not a supervisor", name))?,
                None => prompt::choose_supervisor(&supervisors)?,
            };
            println!("✔ {}\n", chosen.display_name());

            if dry_run {
                let body = session.job_card_preview(&chosen.username)?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                session.teardown();
                return Ok(());
            }

            println!("[4/4] Submitting...");
            let body = loop {
                match session.submit_inspection(&chosen.username).await {
                    Ok(body) => break body,
                    Err(e) => {
                        if !prompt::offer_retry(&e) {
                            session.teardown();
                            return Err(e.into());
                        }
                        println!("[4/4] Submitting again...");
                    }
                }
            };
            session.teardown();
            println!("\n✅ Job card submitted ({} defect item(s))", body.defect_count());
        }

        Commands::Rectify { chassis, supervisor } => {
            let api = ApiClient::new(&config)?;
            let mut session = Session::new(api, config.username()?);

            println!("🔧 pdi - Rectification\n");
            session.load_rectification(&chassis).await?;

            let tracker = session.context().rectification();
            if let Some(info) = tracker.car_info() {
                println!("{} {} ({})", info.model, info.variant, info.chassis_no);
            }
            if tracker.items().is_empty() {
                println!("✔ No open defects");
                session.teardown();
                return Ok(());
            }
            for group in tracker.grouped() {
                println!("  {}: {} item(s)", group.label(), group.items.len());
            }
            for image in tracker.images() {
                let marks = tracker.marks_for_image(image.id);
                println!("  {}: {} mark(s)", image.name, marks.len());
            }
            println!();

            let submit = prompt::run_rectification(session.context_mut().rectification_mut())?;
            if !submit {
                session.teardown();
                println!("Rectification left open");
                return Ok(());
            }

            let supervisors = loop {
                match session.supervisors().await {
                    Ok(list) => break list,
                    Err(e) => {
                        if !prompt::offer_retry(&e) {
                            session.teardown();
                            return Err(e.into());
                        }
                    }
                }
            };
            let chosen = match supervisor {
                Some(name) => supervisors
                    .iter()
                    .find(|u| u.username == name)
                    .with_context(|| format!("{} is not a supervisor", name))?,
                None => prompt::choose_supervisor(&supervisors)?,
            };

            let body = loop {
                match session.submit_rectification(chosen.id).await {
                    Ok(body) => break body,
                    Err(e) => {
                        if !prompt::offer_retry(&e) {
                            session.teardown();
                            return Err(e.into());
                        }
                    }
                }
            };
            session.teardown();
            println!("\n✅ {} item(s) rectified", body.rectify_items.len());
        }

        Commands::Approve { chassis, decision } => {
            let api = ApiClient::new(&config)?;
            let session = Session::new(api, config.username()?);
            session.approve(&chassis, decision).await?;
            println!("✔ {} marked {}", chassis.to_uppercase(), decision);
        }

        Commands::Supervisors => {
            let api = ApiClient::new(&config)?;
            let session = Session::new(api, config.username()?);
            for user in session.supervisors().await? {
                println!("  {:>4}  {:<16} {}", user.id, user.username, user.name);
            }
        }
    }

    Ok(())
}

fn print_matches(rows: Vec<pdi_inspect::api::VehicleSummary>) {
    if rows.is_empty() {
        println!("  (no matches)");
    }
    for row in rows {
        println!("  {:<20} {} {}", row.chassis_no, row.model, row.variant);
    }
}
