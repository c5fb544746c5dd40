//! routectl - command-line client for the nginx route authority
//!
//! Usage:
//!   routectl routes [--domain D] [--path P]   List routes, optionally filtered
//!   routectl routes grouped                   List routes grouped by domain
//!   routectl routes for <domain>              List routes under one domain
//!
//!   routectl domains                          List domain keys
//!   routectl domain show <domain>             Print domain-level custom config
//!   routectl domain set <domain> <file|->     Replace domain-level custom config
//!
//!   routectl create <flags>                   Create a route (validated locally)
//!   routectl update <id> <flags>              Update a route
//!   routectl activate <id> | deactivate <id>  Toggle a route
//!   routectl delete <id>                      Delete a route permanently
//!   routectl reconnect <id|all>               Re-attach route containers
//!   routectl verify                           Re-check all docker upstreams
//!
//!   routectl ping                             Check the authority is reachable
//!   routectl status                           Proxy process status
//!   routectl reload                           Regenerate config and reload proxy
//!   routectl settings                         Authority's static configuration

use anyhow::{bail, Context, Result};
use routectl::client::AuthorityClient;
use routectl::config::ClientConfig;
use routectl::error::RemoteError;
use routectl::reconcile::Workspace;
use routectl::route::{filter_routes, group_by_domain, ProxyType, Route, Upstream};
use routectl::status::NginxStatus;
use routectl::validate::{validate, RouteDraft, ValidationResult};
use std::env;
use std::io::Read;
use std::time::Duration;

#[derive(Debug)]
enum Command {
    Routes(RoutesCommand),
    Domains,
    Domain(DomainCommand),
    Create { flags: Vec<String> },
    Update { id: i64, flags: Vec<String> },
    Activate { id: i64 },
    Deactivate { id: i64 },
    Delete { id: i64 },
    Reconnect { id: i64 },
    ReconnectAll,
    Verify,
    Ping,
    Status,
    Reload,
    Settings,
    Help,
    Version,
}

#[derive(Debug)]
enum RoutesCommand {
    List { domain: String, path: String },
    Grouped,
    ForDomain { domain: String },
}

#[derive(Debug)]
enum DomainCommand {
    Show { domain: String },
    Set { domain: String, source: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let command = parse_command(&args[1..])?;

    if matches!(command, Command::Help) {
        print_help();
        return Ok(());
    }
    if matches!(command, Command::Version) {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = ClientConfig::resolve()?;
    let client = AuthorityClient::new(&config.api_url, Duration::from_secs(config.timeout_secs));
    let workspace = Workspace::new(client);

    match command {
        Command::Routes(cmd) => handle_routes(&workspace, cmd).await?,
        Command::Domains => handle_domains(&workspace).await?,
        Command::Domain(cmd) => handle_domain(&workspace, cmd).await?,
        Command::Create { flags } => handle_create(&workspace, &flags).await?,
        Command::Update { id, flags } => handle_update(&workspace, id, &flags).await?,
        Command::Activate { id } => handle_set_enabled(&workspace, id, true).await?,
        Command::Deactivate { id } => handle_set_enabled(&workspace, id, false).await?,
        Command::Delete { id } => handle_delete(&workspace, id).await?,
        Command::Reconnect { id } => handle_reconnect(&workspace, id).await?,
        Command::ReconnectAll => handle_reconnect_all(&workspace).await?,
        Command::Verify => handle_verify(&workspace).await?,
        Command::Ping => handle_ping(&workspace).await?,
        Command::Status => handle_status(&workspace).await?,
        Command::Reload => handle_reload(&workspace).await?,
        Command::Settings => handle_settings(&workspace).await?,
        Command::Help | Command::Version => unreachable!(),
    }

    Ok(())
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args[0].as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "version" | "--version" | "-v" => Ok(Command::Version),
        "routes" | "ls" => parse_routes_command(&args[1..]),
        "domains" => Ok(Command::Domains),
        "domain" => parse_domain_command(&args[1..]),
        "create" | "add" => Ok(Command::Create {
            flags: args[1..].to_vec(),
        }),
        "update" | "edit" => {
            let id = parse_id(args.get(1))?;
            Ok(Command::Update {
                id,
                flags: args[2..].to_vec(),
            })
        }
        "activate" | "enable" => Ok(Command::Activate {
            id: parse_id(args.get(1))?,
        }),
        "deactivate" | "disable" => Ok(Command::Deactivate {
            id: parse_id(args.get(1))?,
        }),
        "delete" | "rm" => Ok(Command::Delete {
            id: parse_id(args.get(1))?,
        }),
        "reconnect" | "connect" => {
            if args.get(1).map(|s| s.as_str()) == Some("all") {
                Ok(Command::ReconnectAll)
            } else {
                Ok(Command::Reconnect {
                    id: parse_id(args.get(1))?,
                })
            }
        }
        "verify" => Ok(Command::Verify),
        "ping" => Ok(Command::Ping),
        "status" => Ok(Command::Status),
        "reload" | "restart" => Ok(Command::Reload),
        "settings" => Ok(Command::Settings),
        other => bail!("Unknown command '{}'. Try 'routectl help'.", other),
    }
}

fn parse_id(arg: Option<&String>) -> Result<i64> {
    let arg = arg.context("Missing route id")?;
    arg.parse()
        .with_context(|| format!("Invalid route id '{}'", arg))
}

fn parse_routes_command(args: &[String]) -> Result<Command> {
    match args.first().map(|s| s.as_str()) {
        Some("grouped") | Some("by-domain") => Ok(Command::Routes(RoutesCommand::Grouped)),
        Some("for") => {
            let domain = args.get(1).cloned().context("Missing domain")?;
            Ok(Command::Routes(RoutesCommand::ForDomain { domain }))
        }
        _ => {
            let domain = flag_value(args, "--domain").unwrap_or_default();
            let path = flag_value(args, "--path").unwrap_or_default();
            Ok(Command::Routes(RoutesCommand::List { domain, path }))
        }
    }
}

fn parse_domain_command(args: &[String]) -> Result<Command> {
    match args.first().map(|s| s.as_str()) {
        Some("show") | Some("get") => {
            let domain = args.get(1).cloned().context("Missing domain")?;
            Ok(Command::Domain(DomainCommand::Show { domain }))
        }
        Some("set") => {
            let domain = args.get(1).cloned().context("Missing domain")?;
            let source = args
                .get(2)
                .cloned()
                .context("Missing config source (file path or '-' for stdin)")?;
            Ok(Command::Domain(DomainCommand::Set { domain, source }))
        }
        _ => bail!("Usage: routectl domain <show|set> <domain> [file|-]"),
    }
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1).cloned())
}

/// Build a draft from `--key value` flags, starting from `base` (defaults
/// for create, the existing route's fields for update).
fn draft_from_flags(mut draft: RouteDraft, flags: &[String]) -> Result<RouteDraft> {
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i].as_str();
        let value = flags
            .get(i + 1)
            .with_context(|| format!("Missing value for {}", flag))?;
        match flag {
            "--domain" => draft.domain = value.clone(),
            "--path" => draft.path = value.clone(),
            "--type" => {
                draft.proxy_type = match value.as_str() {
                    "docker" => ProxyType::Docker,
                    "static" => ProxyType::Static,
                    other => bail!("Unknown proxy type '{}' (expected docker or static)", other),
                }
            }
            "--container" => draft.container_id = value.clone(),
            "--port" => {
                draft.port = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid port '{}'", value))?,
                )
            }
            "--target-path" => draft.target_path = value.clone(),
            "--static-path" => draft.static_path = value.clone(),
            "--custom-config" => draft.custom_config = value.clone(),
            "--description" => draft.description = value.clone(),
            "--project" => draft.project_name = value.clone(),
            "--contact" => draft.contact_user = value.clone(),
            other => bail!("Unknown flag '{}'", other),
        }
        i += 2;
    }
    Ok(draft)
}

fn upstream_label(route: &Route) -> String {
    match &route.upstream {
        Upstream::Docker {
            container_id,
            port,
            target_path,
        } => format!("{}:{} -> {}", container_id, port, target_path),
        Upstream::Static { static_path } => format!("static {}", static_path),
    }
}

fn print_route_table(routes: &[&Route]) {
    println!(
        "  {:<5} {:<3} {:<25} {:<20} {:<8} {:<35} {}",
        "ID", "ON", "DOMAIN", "PATH", "TYPE", "UPSTREAM", "INFO"
    );
    for route in routes {
        let domain = if route.domain.is_empty() {
            "(any host)"
        } else {
            route.domain.as_str()
        };
        println!(
            "  {:<5} {:<3} {:<25} {:<20} {:<8} {:<35} {}",
            route.id,
            if route.enabled { "on" } else { "off" },
            domain,
            route.path,
            route.upstream.proxy_type().to_string(),
            upstream_label(route),
            route.info.as_deref().unwrap_or("")
        );
    }
}

/// Pull the routes view and return its data, surfacing the recorded error
/// when there is no snapshot to show.
async fn settled_routes(workspace: &Workspace) -> Result<Vec<Route>> {
    workspace.refresh_routes().await;
    let snap = workspace.routes.snapshot().await;
    match snap.data {
        Some(routes) => {
            if let Some(err) = snap.last_error {
                eprintln!("Warning: showing stale data, last refresh failed: {}", err);
            }
            Ok(routes)
        }
        None => bail!(
            "Failed to fetch routes: {}",
            snap.last_error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

async fn handle_routes(workspace: &Workspace, cmd: RoutesCommand) -> Result<()> {
    match cmd {
        RoutesCommand::List { domain, path } => {
            let routes = settled_routes(workspace).await?;
            let filtered = filter_routes(&routes, &domain, &path);
            println!("Routes ({} of {}):", filtered.len(), routes.len());
            print_route_table(&filtered);
        }
        RoutesCommand::Grouped => {
            let routes = settled_routes(workspace).await?;
            for (domain, group) in group_by_domain(&routes) {
                let label = if domain.is_empty() {
                    "(any host)".to_string()
                } else {
                    domain
                };
                println!("{}:", label);
                print_route_table(&group.iter().collect::<Vec<_>>());
                println!();
            }
        }
        RoutesCommand::ForDomain { domain } => {
            let routes = workspace.client().routes_for_domain(&domain).await?;
            println!("Routes for {} ({}):", domain, routes.len());
            print_route_table(&routes.iter().collect::<Vec<_>>());
        }
    }
    Ok(())
}

async fn handle_domains(workspace: &Workspace) -> Result<()> {
    workspace.refresh_domains().await;
    let snap = workspace.domains.snapshot().await;
    let domains = match snap.data {
        Some(domains) => domains,
        None => bail!(
            "Failed to fetch domains: {}",
            snap.last_error.unwrap_or_else(|| "unknown error".to_string())
        ),
    };
    println!("Domains ({}):", domains.len());
    for domain in domains {
        println!("  {}", domain);
    }
    Ok(())
}

async fn handle_domain(workspace: &Workspace, cmd: DomainCommand) -> Result<()> {
    match cmd {
        DomainCommand::Show { domain } => {
            let config = workspace.client().domain_config(&domain).await?;
            println!("{}", config);
        }
        DomainCommand::Set { domain, source } => {
            let config = if source == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read config from stdin")?;
                buf
            } else {
                std::fs::read_to_string(&source)
                    .with_context(|| format!("Failed to read config file {}", source))?
            };
            workspace.update_domain_config(&domain, &config).await?;
            println!("Domain config for {} updated.", domain);
        }
    }
    Ok(())
}

async fn handle_create(workspace: &Workspace, flags: &[String]) -> Result<()> {
    let draft = draft_from_flags(RouteDraft::default(), flags)?;

    // Validate up front so the operator sees the full missing-field set
    // instead of the first failure.
    if let ValidationResult::Invalid { missing } = validate(&draft) {
        let fields: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
        bail!("Route is incomplete, missing: {}", fields.join(", "));
    }

    let created = workspace.create_route(draft).await?;
    println!(
        "Route created: {} {} ({})",
        if created.domain.is_empty() {
            "(any host)"
        } else {
            created.domain.as_str()
        },
        created.path,
        upstream_label(&created)
    );

    if let Some(routes) = workspace.routes.snapshot().await.data {
        println!();
        println!("Routes ({}):", routes.len());
        print_route_table(&routes.iter().collect::<Vec<_>>());
    }
    Ok(())
}

async fn handle_update(workspace: &Workspace, id: i64, flags: &[String]) -> Result<()> {
    let routes = settled_routes(workspace).await?;
    let existing = routes
        .iter()
        .find(|r| r.id == id)
        .with_context(|| format!("No route with id {}", id))?;

    let draft = draft_from_flags(RouteDraft::from_route(existing), flags)?;
    let mut route = draft.build().map_err(|e| anyhow::anyhow!("{}", e))?;
    route.id = id;
    route.enabled = existing.enabled;

    workspace.update_route(&route).await?;
    println!("Route {} updated.", id);
    Ok(())
}

async fn handle_set_enabled(workspace: &Workspace, id: i64, enabled: bool) -> Result<()> {
    workspace.set_route_enabled(id, enabled).await?;
    println!(
        "Route {} {}.",
        id,
        if enabled { "activated" } else { "deactivated" }
    );
    Ok(())
}

async fn handle_delete(workspace: &Workspace, id: i64) -> Result<()> {
    workspace.delete_route(id).await?;
    println!("Route {} deleted.", id);
    Ok(())
}

async fn handle_reconnect(workspace: &Workspace, id: i64) -> Result<()> {
    workspace.force_reconnect(id).await?;
    println!("Reconnect requested for route {}.", id);
    Ok(())
}

async fn handle_reconnect_all(workspace: &Workspace) -> Result<()> {
    workspace.reconnect_all().await?;
    println!("Reconnect requested for all docker routes.");
    Ok(())
}

async fn handle_ping(workspace: &Workspace) -> Result<()> {
    workspace.client().docker_ping().await?;
    println!("Authority is up and its docker client answers.");
    Ok(())
}

async fn handle_verify(workspace: &Workspace) -> Result<()> {
    workspace.verify_backends().await?;
    println!("Backend verification requested; routes with missing containers get deactivated.");
    if let Some(routes) = workspace.routes.snapshot().await.data {
        print_route_table(&routes.iter().collect::<Vec<_>>());
    }
    Ok(())
}

fn print_status(status: &NginxStatus) {
    println!("State:      {}", status.state);
    println!("Running:    {}", if status.running { "yes" } else { "no" });
    match &status.started_at {
        Some(started) => println!("Started:    {}", started.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Started:    never"),
    }
}

async fn handle_status(workspace: &Workspace) -> Result<()> {
    workspace.refresh_status().await;
    let snap = workspace.status.snapshot().await;
    match snap.data {
        Some(status) => print_status(&status),
        None => bail!(
            "Failed to fetch proxy status: {}",
            snap.last_error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
    Ok(())
}

async fn handle_reload(workspace: &Workspace) -> Result<()> {
    println!("Regenerating nginx configuration and reloading...");
    let result = workspace.restart_proxy().await;

    // Status was re-fetched regardless of the reload outcome; show whatever
    // we know before reporting the result.
    if let Some(status) = workspace.status.snapshot().await.data {
        print_status(&status);
    }

    match result {
        Ok(()) => {
            println!("Reload complete.");
            Ok(())
        }
        Err(e @ RemoteError::Transient { .. }) => {
            // A timeout here does not prove the reload failed server-side.
            bail!("Reload did not confirm: {} (it may still have completed)", e)
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_settings(workspace: &Workspace) -> Result<()> {
    let settings = workspace.client().server_settings().await?;
    println!("Docker:");
    println!("  base_url:   {}", settings.docker.base_url);
    println!("  network:    {}", settings.docker.network);
    println!();
    println!("Nginx:");
    println!("  container:  {}", settings.nginx.container_id);
    println!("  config:     {}", settings.nginx.config_path);
    println!("  static:     {}", settings.nginx.static_path);
    println!("  certs:      {}", settings.nginx.certificate_path);
    Ok(())
}

fn print_help() {
    println!("routectl - client for the nginx route authority");
    println!();
    println!("Usage:");
    println!("  routectl routes [--domain D] [--path P]   List routes, optionally filtered");
    println!("  routectl routes grouped                   List routes grouped by domain");
    println!("  routectl routes for <domain>              List routes under one domain");
    println!();
    println!("  routectl domains                          List domain keys");
    println!("  routectl domain show <domain>             Print domain-level custom config");
    println!("  routectl domain set <domain> <file|->     Replace domain-level custom config");
    println!();
    println!("  routectl create <flags>                   Create a route");
    println!("  routectl update <id> <flags>              Update a route");
    println!("  routectl activate <id>                    Enable a route");
    println!("  routectl deactivate <id>                  Disable a route");
    println!("  routectl delete <id>                      Delete a route permanently");
    println!("  routectl reconnect <id>                   Re-attach a route's container");
    println!("  routectl reconnect all                    Re-attach every docker route's container");
    println!("  routectl verify                           Re-check all docker upstreams");
    println!();
    println!("  routectl ping                             Check the authority is reachable");
    println!("  routectl status                           Proxy process status");
    println!("  routectl reload                           Regenerate config and reload proxy");
    println!("  routectl settings                         Authority's static configuration");
    println!();
    println!("Route flags:");
    println!("  --domain <host>          Host to match (omit for any-host routes)");
    println!("  --path <prefix>          Match prefix, e.g. /api");
    println!("  --type <docker|static>   Upstream kind");
    println!("  --container <id>         Container name/id   (docker)");
    println!("  --port <port>            Container port      (docker)");
    println!("  --target-path <path>     Path inside the container, default /");
    println!("  --static-path <path>     File tree to serve  (static)");
    println!("  --custom-config <text>   Extra location-block lines, passed verbatim");
    println!("  --project <name>         Project name (required)");
    println!("  --contact <name>         Contact person (required)");
    println!("  --description <text>     Free-form note");
    println!();
    println!("Environment:");
    println!("  ROUTECTL_API_URL         Authority base URL (default http://localhost:8000)");
    println!("  ROUTECTL_TIMEOUT_SECS    Request timeout (default 30)");
    println!("  Config file: ~/.routectl/config.toml (api_url, timeout_secs)");
}
