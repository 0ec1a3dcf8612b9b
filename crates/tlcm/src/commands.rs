//! Command handlers for the `tlcm` shell
//!
//! Field validation and normalization happen here, before records reach
//! the store. Store and launch errors are passed up untouched so `main`
//! can pick the exit status and remediation text.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgAction, Args as ClapArgs, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use tlcm_core::config::SettingsFile;
use tlcm_core::launch::{check_config_name, probe_version, LaunchCoordinator};
use tlcm_core::profiles::{AuthType, Consent, ProfileRecord, RecoveryState};
use tlcm_core::Settings;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all profiles
    List,
    /// Show one profile
    Show { name: String },
    /// Create a profile
    Add(AddArgs),
    /// Change a profile
    Edit(EditArgs),
    /// Delete a profile and its client configuration
    Delete { name: String },
    /// Start the ThinLinc client for a profile
    Launch { name: String },
    /// Locate the ThinLinc client and report its version
    Client,
    /// Back up a damaged profile document and start over
    Recover {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(ClapArgs, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub server: String,
    #[arg(long)]
    pub username: String,
    /// Authenticate with this private key instead of a password
    #[arg(long, value_name = "PATH")]
    pub ssh_key: Option<String>,
    /// Connect without prompting (SSH key profiles only)
    #[arg(long, requires = "ssh_key")]
    pub auto_connect: bool,
}

#[derive(ClapArgs, Debug)]
pub struct EditArgs {
    /// Current profile name
    pub profile: String,
    /// New profile name
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub server: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    /// Switch to password authentication
    #[arg(long, conflicts_with = "ssh_key")]
    pub password: bool,
    /// Switch to (or change) SSH key authentication
    #[arg(long, value_name = "PATH")]
    pub ssh_key: Option<String>,
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    pub auto_connect: Option<bool>,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    Set(SettingsSetArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SettingsSetArgs {
    /// Template configuration used for first launches
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,
    /// ThinLinc client executable
    #[arg(long, value_name = "PATH", conflicts_with = "clear_client")]
    pub client: Option<PathBuf>,
    /// Go back to searching for the client
    #[arg(long)]
    pub clear_client: bool,
    #[arg(long, value_name = "PATH")]
    pub configs_dir: Option<PathBuf>,
    #[arg(long, value_name = "SECS")]
    pub probe_timeout: Option<u64>,
}

pub async fn run(home: Option<PathBuf>, command: Command) -> anyhow::Result<()> {
    let settings = Settings::load(home)?;
    debug!("Using data directory {:?}", settings.home);

    let store = settings.profile_store();
    let coordinator = LaunchCoordinator::from_settings(&settings);

    match command {
        Command::List => {
            let profiles = store.load()?;
            print!("{}", render_table(&profiles));
        }
        Command::Show { name } => {
            let profile = store.get(&name)?;
            print!("{}", render_profile(&profile));
            println!("config:       {}", coordinator.config_path(&profile.name).display());
        }
        Command::Add(args) => {
            let record = new_record(args)?;
            check_config_name(&record.name, None, &store.load()?)?;
            let name = record.name.clone();
            store.add(record)?;
            println!("Added profile '{}'", name);
        }
        Command::Edit(args) => {
            let original = args.profile.clone();
            let record = edited_record(store.get(&original)?, args)?;
            check_config_name(&record.name, Some(&original), &store.load()?)?;
            let name = record.name.clone();
            store.update(&original, record)?;

            if name != original && coordinator.rename_config(&original, &name)? {
                info!("Moved client configuration from '{}' to '{}'", original, name);
            }
            println!("Updated profile '{}'", name);
        }
        Command::Delete { name } => match store.delete(&name)? {
            Some(removed) => {
                coordinator.remove_config(&removed.name)?;
                println!("Deleted profile '{}'", removed.name);
            }
            None => println!("No profile named '{}'; nothing to delete", name),
        },
        Command::Launch { name } => {
            let profile = store.get(&name)?;
            let report = coordinator.launch(&profile)?;
            println!(
                "Started ThinLinc client for '{}' (pid {})",
                profile.name, report.pid
            );
        }
        Command::Client => {
            let client = coordinator.locator().locate()?;
            println!("client:  {}", client.display());

            let version = probe_version(&client, settings.probe_timeout).await?;
            if version.success {
                println!("version: {}", version.text);
            } else {
                println!("version: unknown ({})", version.text);
            }
        }
        Command::Recover { yes } => recover(&settings, yes).await?,
        Command::Settings(SettingsCommand::Show) => print!("{}", render_settings(&settings)),
        Command::Settings(SettingsCommand::Set(args)) => {
            let path = settings.settings_path();
            let mut file = SettingsFile::load(&path)?;
            apply_settings(&mut file, args)?;
            file.save(&path)?;

            let updated = Settings::resolve(settings.home.clone(), &file)?;
            print!("{}", render_settings(&updated));
        }
    }

    Ok(())
}

async fn recover(settings: &Settings, assume_yes: bool) -> anyhow::Result<()> {
    let Some(mut recovery) = settings.profile_store().check()? else {
        println!(
            "Profile document {} is healthy",
            settings.profiles_file.display()
        );
        return Ok(());
    };

    let path = recovery.path().to_path_buf();
    let question = recovery.request_consent()?;
    let consent = if assume_yes {
        println!("{}", question);
        Consent::Approve
    } else {
        ask(&question).await?
    };

    match recovery.resolve(consent)? {
        RecoveryState::Reset { backup } => {
            println!("Backed up the damaged document to {}", backup.display());
            println!("Started a new, empty profile list");
            Ok(())
        }
        _ => bail!("recovery declined; {} was left untouched", path.display()),
    }
}

async fn ask(question: &str) -> anyhow::Result<Consent> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{} [y/N] ", question).as_bytes())
        .await?;
    stdout.flush().await?;

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    Ok(parse_consent(&line))
}

fn parse_consent(answer: &str) -> Consent {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Consent::Approve,
        _ => Consent::Decline,
    }
}

fn new_record(args: AddArgs) -> anyhow::Result<ProfileRecord> {
    let record = match args.ssh_key {
        Some(key) => ProfileRecord::ssh_key(
            args.name,
            args.server,
            args.username,
            key,
            args.auto_connect,
        ),
        None => ProfileRecord::password(args.name, args.server, args.username),
    };

    record.validate()?;
    Ok(record.normalized())
}

fn edited_record(mut record: ProfileRecord, args: EditArgs) -> anyhow::Result<ProfileRecord> {
    if let Some(name) = args.name {
        record.name = name;
    }
    if let Some(server) = args.server {
        record.server = server;
    }
    if let Some(username) = args.username {
        record.username = username;
    }
    if args.password {
        record.auth_type = AuthType::Password;
    }
    if let Some(key) = args.ssh_key {
        record.auth_type = AuthType::SshKey;
        record.auth_data = key;
    }
    if let Some(auto_connect) = args.auto_connect {
        if auto_connect && record.auth_type != AuthType::SshKey {
            bail!("auto-connect is only available for SSH key profiles");
        }
        record.auto_connect = auto_connect;
    }

    record.validate()?;
    Ok(record.normalized())
}

fn apply_settings(file: &mut SettingsFile, args: SettingsSetArgs) -> anyhow::Result<()> {
    if let Some(template) = args.template {
        file.template_file = Some(absolute(&template)?);
    }
    if let Some(client) = args.client {
        file.client_path = Some(absolute(&client)?);
    }
    if args.clear_client {
        file.client_path = None;
    }
    if let Some(dir) = args.configs_dir {
        file.configs_dir = Some(absolute(&dir)?);
    }
    if let Some(secs) = args.probe_timeout {
        if secs == 0 {
            bail!("probe timeout must be at least one second");
        }
        file.probe_timeout_secs = Some(secs);
    }
    Ok(())
}

/// Paths typed on the command line are relative to the working directory,
/// not the data directory.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn render_table(profiles: &[ProfileRecord]) -> String {
    if profiles.is_empty() {
        return "No profiles\n".to_string();
    }

    let width = |f: fn(&ProfileRecord) -> &str, title: &str| {
        profiles
            .iter()
            .map(|p| f(p).chars().count())
            .chain(std::iter::once(title.len()))
            .max()
            .unwrap_or(0)
    };
    let name_w = width(|p| p.name.as_str(), "NAME");
    let server_w = width(|p| p.server.as_str(), "SERVER");
    let user_w = width(|p| p.username.as_str(), "USER");

    let mut out = format!(
        "{:<name_w$}  {:<server_w$}  {:<user_w$}  {:<8}  {}\n",
        "NAME", "SERVER", "USER", "AUTH", "AUTO"
    );
    for p in profiles {
        out.push_str(&format!(
            "{:<name_w$}  {:<server_w$}  {:<user_w$}  {:<8}  {}\n",
            p.name,
            p.server,
            p.username,
            p.auth_type.label(),
            if p.wants_auto_connect() { "yes" } else { "no" },
        ));
    }
    out
}

fn render_profile(profile: &ProfileRecord) -> String {
    let mut out = format!(
        "name:         {}\nserver:       {}\nusername:     {}\nauth:         {}\n",
        profile.name, profile.server, profile.username, profile.auth_type
    );
    if profile.auth_type == AuthType::SshKey {
        out.push_str(&format!("ssh key:      {}\n", profile.auth_data));
        out.push_str(&format!(
            "auto-connect: {}\n",
            if profile.auto_connect { "yes" } else { "no" }
        ));
    }
    out
}

fn render_settings(settings: &Settings) -> String {
    format!(
        "data dir:      {}\nprofiles:      {}\nconfigs:       {}\ntemplate:      {}\nclient:        {}\nprobe timeout: {}s\n",
        settings.home.display(),
        settings.profiles_file.display(),
        settings.configs_dir.display(),
        settings.template_file.display(),
        settings
            .client_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search PATH and install locations)".to_string()),
        settings.probe_timeout.as_secs(),
    )
}
