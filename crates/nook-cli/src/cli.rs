use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "nook",
    about = "Nook: local rentals and jobs store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// JSON document holding the store
    #[arg(long, global = true, default_value = "nook.json")]
    pub store: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage rental listings
    Listing(ListingArgs),
    /// Manage job offers
    Job(JobArgs),
    /// Book listings and list bookings
    Reservation(ReservationArgs),
    /// Manage user accounts
    User(UserArgs),
    /// Inspect and maintain stored image buckets
    Images(ImagesArgs),
    /// Password reset requests and fulfillment
    Reset(ResetArgs),
    /// Failed-login bookkeeping
    Login(LoginArgs),
    /// Password utilities
    Password(PasswordArgs),
    /// Check that every stored collection decodes
    Verify(VerifyArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

// ---- Listings ----

#[derive(Args)]
pub struct ListingArgs {
    #[command(subcommand)]
    pub action: ListingAction,
}

#[derive(Subcommand)]
pub enum ListingAction {
    Add {
        title: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "1")]
        capacity: u32,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        host: Option<String>,
        /// Primary image reference
        #[arg(long)]
        image: Option<String>,
        /// Gallery image references
        #[arg(long = "gallery")]
        images: Vec<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

// ---- Jobs ----

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub action: JobAction,
}

#[derive(Subcommand)]
pub enum JobAction {
    Add {
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        salary: Option<String>,
        #[arg(long)]
        contract: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long = "gallery")]
        images: Vec<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

// ---- Reservations ----

#[derive(Args)]
pub struct ReservationArgs {
    #[command(subcommand)]
    pub action: ReservationAction,
}

#[derive(Subcommand)]
pub enum ReservationAction {
    Add {
        listing: String,
        #[arg(long)]
        guest: String,
        #[arg(long)]
        email: String,
        /// Arrival date, YYYY-MM-DD
        #[arg(long)]
        check_in: String,
        /// Departure date, YYYY-MM-DD
        #[arg(long)]
        check_out: String,
        #[arg(long, default_value = "1")]
        guests: u32,
    },
    List {
        /// Only reservations of this listing
        #[arg(long)]
        listing: Option<String>,
    },
    Confirm { id: String },
    Cancel { id: String },
}

// ---- Users ----

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    Add {
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        admin: bool,
        /// Initial password; generated when omitted
        #[arg(long)]
        password: Option<String>,
    },
    List,
}

// ---- Images ----

#[derive(Args)]
pub struct ImagesArgs {
    #[command(subcommand)]
    pub action: ImagesAction,
}

#[derive(Subcommand)]
pub enum ImagesAction {
    /// Show the resolved images of an entity and where they came from
    Resolve { kind: String, id: String },
    /// Store references in an entity's bucket
    Save {
        kind: String,
        id: String,
        images: Vec<String>,
    },
    /// Remove an entity's bucket
    Clear { kind: String, id: String },
    /// Remove every image bucket
    Purge,
    /// Record the last upload of a kind
    Latest { kind: String, images: Vec<String> },
}

// ---- Security ----

#[derive(Args)]
pub struct ResetArgs {
    #[command(subcommand)]
    pub action: ResetAction,
}

#[derive(Subcommand)]
pub enum ResetAction {
    Request {
        email: String,
        #[arg(long)]
        user_agent: Option<String>,
    },
    Fulfill {
        email: String,
        /// New password; generated when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "admin")]
        actor: String,
    },
    List {
        /// Case-insensitive email substring
        filter: Option<String>,
        #[arg(long)]
        pending: bool,
    },
    Log,
}

#[derive(Args)]
pub struct LoginArgs {
    #[command(subcommand)]
    pub action: LoginAction,
}

#[derive(Subcommand)]
pub enum LoginAction {
    /// Try a password, counting failures
    Try { email: String, password: String },
    Fail { email: String },
    Success { email: String },
    Status { email: String },
}

#[derive(Args)]
pub struct PasswordArgs {
    #[command(subcommand)]
    pub action: PasswordAction,
}

#[derive(Subcommand)]
pub enum PasswordAction {
    Generate {
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct ConfigArgs {}
