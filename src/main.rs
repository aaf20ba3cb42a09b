use siteadmin::modules::client::HttpClient;
use siteadmin::modules::controller::{toggle_flag, CrudController, FlagChange, Removal};
use siteadmin::modules::errors::AdminError;
use siteadmin::modules::notify::ConsoleNotifier;
use siteadmin::modules::schema::{Operation, Registry};
use siteadmin::modules::serialize::{load_draft, load_registry_or_builtin, load_settings, Settings};
use siteadmin::modules::session::Session;
use siteadmin::modules::types::Draft;
use std::error::Error;
use std::process::ExitCode;
use simplelog::*;
use std::fs::OpenOptions;
use log::{error, info};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "siteadmin",
    version,
    about = "Content admin for the marketing site backend",
    long_about = include_str!("../help.txt")
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "siteadmin.log")]
    log_file: String,

    #[arg(short = 's', long = "settings", default_value = "./siteadmin.toml")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a session with the configured account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Close the current session
    Logout,
    /// Show the known resources and flags
    Resources,
    /// Show the rows of a resource
    List { resource: String },
    /// Add a row
    Create {
        resource: String,
        #[command(flatten)]
        input: DraftArgs,
    },
    /// Edit a stored row
    Update {
        resource: String,
        id: String,
        #[command(flatten)]
        input: DraftArgs,
    },
    /// Remove a row after confirmation
    Delete {
        resource: String,
        id: String,
        /// Answer the confirmation with yes
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Read or change a site flag; flips it when no option is given
    Toggle {
        flag: String,
        #[arg(long, conflicts_with_all = ["off", "status"])]
        on: bool,
        #[arg(long, conflicts_with = "status")]
        off: bool,
        #[arg(long)]
        status: bool,
    },
}

#[derive(Args)]
struct DraftArgs {
    /// TOML file with field values and nested entries
    #[arg(short = 'd', long)]
    draft: Option<String>,

    /// name=value, repeatable; list fields get one item per use
    #[arg(long = "set", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// name=path of a local file to upload, repeatable
    #[arg(long = "file", value_parser = parse_key_value)]
    file: Vec<(String, String)>,
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got `{arg}`"))
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .build(),
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?,
    )?;
    Ok(())
}

type Controller = CrudController<HttpClient, ConsoleNotifier<std::io::StdinLock<'static>, std::io::Stdout>>;

fn controller(settings: &Settings, registry: &Registry, resource: &str, assume_yes: bool) -> Result<Controller, AdminError> {
    let schema = registry.resource(resource)?.clone();
    let client = HttpClient::new(&settings.base_url, settings.timeout())?;
    Ok(CrudController::new(schema, client, ConsoleNotifier::stdio(assume_yes)))
}

fn fill(controller: &mut Controller, draft: Option<Draft>, input: &DraftArgs) -> Result<(), AdminError> {
    if let Some(draft) = draft {
        controller.apply_draft(draft)?;
    }
    for (name, value) in &input.set {
        controller.set_input(name, value)?;
    }
    for (name, path) in &input.file {
        controller.attach_file(name, path)?;
    }
    Ok(())
}

/// Runs one resource command. `Ok(false)` means the action failed and the
/// notifier has already told the user why.
fn run(command: Command, settings: &Settings) -> Result<bool, AdminError> {
    let registry = load_registry_or_builtin(settings)?;

    match command {
        Command::Resources => {
            for resource in &registry.resources {
                println!("{resource}");
            }
            for flag in &registry.flags {
                println!("{flag}");
            }
            Ok(true)
        }
        Command::List { resource } => {
            let mut controller = controller(settings, &registry, &resource, false)?;
            if controller.list().is_err() {
                return Ok(false);
            }
            print!("{}", controller.table());
            Ok(true)
        }
        Command::Create { resource, input } => {
            let draft = input.draft.as_deref().map(load_draft).transpose()?;
            let mut controller = controller(settings, &registry, &resource, false)?;
            if controller.schema().supports(Operation::List) && controller.list().is_err() {
                return Ok(false);
            }
            if fill(&mut controller, draft, &input).is_err() || controller.submit_create().is_err() {
                return Ok(false);
            }
            if controller.schema().supports(Operation::List) {
                print!("{}", controller.table());
            }
            Ok(true)
        }
        Command::Update { resource, id, input } => {
            let draft = input.draft.as_deref().map(load_draft).transpose()?;
            let mut controller = controller(settings, &registry, &resource, false)?;
            let saved = controller.list().is_ok()
                && controller.begin_edit_by_id(&id).is_ok()
                && fill(&mut controller, draft, &input).is_ok()
                && controller.submit_update().is_ok();
            if saved {
                print!("{}", controller.table());
            }
            Ok(saved)
        }
        Command::Delete { resource, id, yes } => {
            let mut controller = controller(settings, &registry, &resource, yes)?;
            match controller.remove(&id) {
                Ok(Removal::Deleted) => {
                    print!("{}", controller.table());
                    Ok(true)
                }
                Ok(Removal::Declined) => Ok(true),
                Err(_) => Ok(false),
            }
        }
        Command::Toggle { flag, on, off, status } => {
            let flag = registry.flag(&flag)?;
            let change = match (on, off, status) {
                (true, _, _) => FlagChange::Set(true),
                (_, true, _) => FlagChange::Set(false),
                (_, _, true) => FlagChange::Show,
                _ => FlagChange::Flip,
            };
            let client = HttpClient::new(&settings.base_url, settings.timeout())?;
            let mut notifier = ConsoleNotifier::stdio(false);
            Ok(toggle_flag(&client, &mut notifier, flag, change).is_ok())
        }
        Command::Login { .. } | Command::Logout => Ok(true),
    }
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let settings = load_settings(&cli.settings)?;
    let mut session = Session::open(&settings.session_file)?;

    let outcome = match cli.command {
        Command::Login { email, password } => session.login(&email, &password, &settings.login).map(|_| {
            println!("Logged in as {email}.");
            true
        }),
        Command::Logout => session.logout().map(|_| {
            println!("Logged out.");
            true
        }),
        command => match session.require() {
            Ok(user) => {
                info!("Running as {user}");
                run(command, &settings)
            }
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
