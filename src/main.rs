use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use nutrizone_auth::auth::{handlers, password_strength, LoginForm, RegisterForm};
use nutrizone_auth::{AppError, AppState, RouteGuard, Settings};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "nutrizone-auth", about = "NutriZone session and mock authentication")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in against the local credential directory
    Login { email: String, password: String },
    /// Register a new local account and log in as it
    Register {
        name: String,
        email: String,
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm: Option<String>,
        #[arg(long)]
        accept_terms: bool,
    },
    /// End the current session
    Logout,
    /// Show the current user
    Whoami,
    /// List known accounts
    Users,
    /// Show what a route guard would do right now
    Guard {
        #[arg(value_enum)]
        kind: GuardKind,
    },
    /// Rate a candidate password
    Strength { password: String },
    /// Ask the configured backend who the stored token belongs to
    Me,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GuardKind {
    Protected,
    Public,
}

impl From<GuardKind> for RouteGuard {
    fn from(kind: GuardKind) -> Self {
        match kind {
            GuardKind::Protected => RouteGuard::Protected,
            GuardKind::Public => RouteGuard::Public,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load configuration")?;
    let state = AppState::new(settings)
        .await
        .context("Failed to initialize application state")?;

    let outcome = run(&state, cli.command).await;
    state.shutdown().await?;

    if let Err(e) = outcome {
        error!("Command failed: {}", e);
        eprintln!("{}", e.user_message());
        if let AppError::ValidationError(errors) = &e {
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field, message);
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(state: &AppState, command: Command) -> Result<(), AppError> {
    match command {
        Command::Login { email, password } => {
            let response = handlers::login(&state.auth, &LoginForm { email, password }).await?;
            println!("Logged in as {} ({:?})", response.user.name, response.user.role);
        }
        Command::Register {
            name,
            email,
            password,
            confirm,
            accept_terms,
        } => {
            let form = RegisterForm {
                confirm_password: confirm.unwrap_or_else(|| password.clone()),
                name,
                email,
                password,
                accept_terms,
            };
            let response = handlers::register(&state.auth, &form).await?;
            println!("Registered and logged in as {}", response.user.email);
        }
        Command::Logout => {
            state.auth.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => match state.auth.current_user().await {
            Some(user) => println!("{} <{}> {:?}", user.name, user.email, user.role),
            None => println!("Not logged in"),
        },
        Command::Users => {
            for user in state.auth.users().await {
                println!("{}\t{}\t{:?}\t{}", user.id, user.email, user.role, user.created_at.to_rfc3339());
            }
        }
        Command::Guard { kind } => {
            let decision = state.guard(kind.into()).await;
            println!("{:?}", decision);
        }
        Command::Strength { password } => {
            let strength = password_strength(&password);
            println!("{:?} ({}/5)", strength.level, strength.score);
        }
        Command::Me => {
            let user = state.api.current_user().await?;
            info!("Backend recognised {}", user.email);
            println!("{} <{}> {:?}", user.name, user.email, user.role);
        }
    }
    Ok(())
}
