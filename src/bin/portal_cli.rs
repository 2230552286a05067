use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use portal_api::{
    config,
    db,
    entities::user::Role,
    events,
    services::users::{CreateUserInput, UserService},
};
use tracing::debug;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::CreateUser(args) => {
            let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
            drop(event_rx);

            let service = UserService::new(Arc::new(pool), Arc::new(event_sender));
            let input = CreateUserInput {
                email: args.email,
                name: args.name,
                password: args.password,
                role: args.role.into(),
                seller_id: args.seller_id,
                document: args.document,
            };
            debug!(role = %input.role, "Creating user");

            let user = service
                .register(input)
                .await
                .context("failed to create user")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("Created {} {} (id {})", user.role, user.email, user.id);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "portal-cli", about = "Sales portal administration", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a user account, e.g. the first master
    CreateUser(CreateUserArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long, env = "PORTAL_USER_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Customer)]
    role: RoleArg,
    #[arg(long)]
    seller_id: Option<Uuid>,
    #[arg(long)]
    document: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Master,
    Admin,
    Seller,
    Customer,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Master => Role::Master,
            RoleArg::Admin => Role::Admin,
            RoleArg::Seller => Role::Seller,
            RoleArg::Customer => Role::Customer,
        }
    }
}
