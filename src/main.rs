use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
mod auth;
use scramgen::{
    CredentialError, Credentials, DEFAULT_ENV_PREFIX, DEFAULT_ITERATIONS, SALT_LEN, ScramParams,
    Storage, Userlist, UserlistEntry, derive,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// JSON file with usernames and passwords
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Read passwords from <PREFIX><USER> environment variables (and .env)
    #[arg(long)]
    from_env: bool,
}

impl SourceArgs {
    fn load(&self, env_prefix: &str) -> Result<Credentials> {
        let creds = match &self.credentials {
            Some(path) => Credentials::from_json_file(path)?,
            None => Credentials::from_env(env_prefix)?,
        };

        if creds.is_empty() {
            match &self.credentials {
                Some(path) => bail!("no users in {}", path.display()),
                None => bail!("no {env_prefix}<USER> variables found"),
            }
        }
        Ok(creds)
    }
}

#[derive(Debug, Parser)]
#[command(name = "scramgen")]
#[command(
    version,
    about = "Generate SCRAM-SHA-256 secrets for connection pooler userlist files."
)]
struct Cli {
    /// PBKDF2 iteration count for new secrets, and the audit target
    #[arg(
        long,
        global = true,
        value_name = "N",
        env = "SCRAMGEN_ITERATIONS",
        default_value_t = DEFAULT_ITERATIONS
    )]
    iterations: u32,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hashes one password and prints a userlist line
    #[command(arg_required_else_help = true)]
    Hash {
        username: String,

        /// Fixed base64 salt (16 bytes) for reproducible output
        #[arg(long, value_name = "BASE64")]
        salt: Option<String>,
    },

    /// Hashes every user from a credentials source into a userlist file
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        /// Environment variable prefix used with --from-env
        #[arg(long, value_name = "PREFIX", default_value = DEFAULT_ENV_PREFIX, requires = "from_env")]
        env_prefix: String,

        /// Write the file here (mode 600) instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Checks a password against a user's stored secret
    #[command(arg_required_else_help = true)]
    Verify {
        username: String,

        /// Userlist file to read
        #[arg(long, value_name = "PATH", env = "SCRAMGEN_USERLIST")]
        userlist: PathBuf,
    },

    /// Lists entries weaker than --iterations or not SCRAM-SHA-256
    Audit {
        /// Userlist file to read
        #[arg(long, value_name = "PATH", env = "SCRAMGEN_USERLIST")]
        userlist: PathBuf,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_salt(salt: &str) -> Result<[u8; SALT_LEN]> {
    let bytes = B64.decode(salt).context("--salt is not valid base64")?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("--salt must decode to {SALT_LEN} bytes, got {len}"))
}

fn load_userlist(path: PathBuf) -> Result<Userlist> {
    let storage = Storage::new(path);
    let data = storage.load()?;
    Userlist::parse(&data).with_context(|| format!("invalid userlist {}", storage.path().display()))
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose, args.quiet);

    let params = ScramParams::new(args.iterations)?;

    match args.command {
        Commands::Hash { username, salt } => {
            let salt = salt.as_deref().map(parse_salt).transpose()?;
            let password = auth::read_new_password()?;

            let record = derive(password.as_bytes(), salt, params)?;
            drop(password);

            println!("{}", UserlistEntry::from_record(&username, &record));
        }
        Commands::Generate {
            source,
            env_prefix,
            output,
            force,
        } => {
            let creds = source.load(&env_prefix)?;
            let list = Userlist::from_credentials(&creds, params)?;
            drop(creds);

            let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string();
            let document = list.render_document(&generated_at);

            match output {
                Some(path) => {
                    let storage = Storage::new(path);
                    if storage.exists() && !force {
                        bail!(
                            "{} already exists (use --force to overwrite)",
                            storage.path().display()
                        );
                    }
                    if force {
                        storage.save(&document)?;
                    } else {
                        storage.save_new(&document)?;
                    }
                    tracing::info!(users = list.len(), "userlist generated");
                    println!(
                        "wrote {} users to {}",
                        list.len(),
                        storage.path().display()
                    );
                }
                None => print!("{document}"),
            }
        }
        Commands::Verify { username, userlist } => {
            let list = load_userlist(userlist)?;
            let entry = list
                .find(&username)
                .ok_or_else(|| CredentialError::UserNotFound(username.clone()))?;
            let record = entry.record()?;

            let password = auth::read_password()?;
            if !record.verify(password.as_bytes())? {
                bail!("password does not match for user '{username}'");
            }
            println!("password matches for user '{username}'");

            if record.needs_rehash(&params) {
                println!(
                    "note: secret uses {} iterations, below the target of {}",
                    record.iterations(),
                    params.iterations()
                );
            }
        }
        Commands::Audit { userlist } => {
            let list = load_userlist(userlist)?;

            let findings: Vec<(&str, String)> = list
                .entries()
                .iter()
                .filter_map(|e| match e.record() {
                    Ok(r) if r.needs_rehash(&params) => {
                        Some((e.username(), format!("{} iterations", r.iterations())))
                    }
                    Ok(_) => None,
                    Err(_) => Some((e.username(), "not a SCRAM-SHA-256 secret".to_string())),
                })
                .collect();

            if findings.is_empty() {
                println!(
                    "all {} entries meet the target of {} iterations",
                    list.len(),
                    params.iterations()
                );
                return Ok(());
            }

            let user_width = findings
                .iter()
                .map(|(u, _)| u.chars().count())
                .chain(std::iter::once("User".len()))
                .max()
                .unwrap_or(0);

            println!("{:<user_width$}  Problem", "User");
            println!("{:-<user_width$}  {:-<7}", "", "");
            for (user, problem) in &findings {
                println!("{user:<user_width$}  {problem}");
            }

            bail!(
                "{} of {} entries need re-hashing (target: {} iterations)",
                findings.len(),
                list.len(),
                params.iterations()
            );
        }
    }

    Ok(())
}
