use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use colored::Colorize;
use nook_media::ImageOrigin;
use nook_sdk::{
    ClientContext, EntityId, EntityKind, Job, JobDraft, Listing, ListingDraft, Nook, NookConfig,
    ReservationDraft, ReservationStatus, Role, User,
};
use nook_types::Illustrated;
use serde::Serialize;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => NookConfig::load(path)?,
        None => NookConfig::default(),
    };
    if let Command::Config(_) = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    tracing::debug!(store = %cli.store.display(), "opening store");
    let nook = Nook::open(&cli.store, config)
        .with_context(|| format!("cannot open store {}", cli.store.display()))?;
    let out = Output(cli.format);

    match cli.command {
        Command::Listing(args) => cmd_listing(&nook, out, args.action).await,
        Command::Job(args) => cmd_job(&nook, out, args.action).await,
        Command::Reservation(args) => cmd_reservation(&nook, out, args.action).await,
        Command::User(args) => cmd_user(&nook, out, args.action).await,
        Command::Images(args) => cmd_images(&nook, out, args.action).await,
        Command::Reset(args) => cmd_reset(&nook, out, args.action).await,
        Command::Login(args) => cmd_login(&nook, out, args.action).await,
        Command::Password(args) => cmd_password(&nook, out, args.action),
        Command::Verify(_) => cmd_verify(&nook, out).await,
        Command::Config(_) => Ok(()),
    }
}

#[derive(Clone, Copy)]
struct Output(OutputFormat);

impl Output {
    /// Print `value` as JSON, or run `text` for human output.
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.0 {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}

fn parse_id(raw: &str) -> anyhow::Result<EntityId> {
    Ok(EntityId::parse(raw)?)
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date {raw}, expected YYYY-MM-DD"))
}

fn short_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn image_line<E: Illustrated>(entity: &E) -> String {
    format!(
        "{} image, {} in gallery",
        if entity.image().is_some() { "1" } else { "no" },
        entity.images().len()
    )
}

// ---- Listings ----

async fn cmd_listing(nook: &Nook, out: Output, action: ListingAction) -> anyhow::Result<()> {
    match action {
        ListingAction::Add {
            title,
            location,
            price,
            capacity,
            description,
            host,
            image,
            images,
        } => {
            let listing = nook
                .add_listing(ListingDraft {
                    title,
                    description,
                    location,
                    price_per_night: price,
                    capacity,
                    host_email: host,
                    image,
                    images,
                })
                .await?;
            out.emit(&listing, || {
                println!(
                    "{} Created listing {} {}",
                    "✓".green().bold(),
                    listing.id.short_id().yellow(),
                    listing.title.bold()
                );
            })
        }
        ListingAction::List => {
            let listings = nook.list_listings().await?;
            out.emit(&listings, || {
                if listings.is_empty() {
                    println!("No listings.");
                }
                for l in &listings {
                    println!(
                        "{}  {}  {}  {:.2}/night  up to {}",
                        l.id.short_id().yellow(),
                        l.title.bold(),
                        l.location,
                        l.price_per_night,
                        l.capacity
                    );
                }
            })
        }
        ListingAction::Show { id } => {
            let listing = nook.listing(&parse_id(&id)?).await?;
            out.emit(&listing, || print_listing(&listing))
        }
        ListingAction::Delete { id } => {
            let removed = nook.delete_listing(&parse_id(&id)?).await?;
            out.emit(&removed, || {
                println!(
                    "{} Deleted listing {} {}",
                    "✓".green(),
                    removed.id.short_id().yellow(),
                    removed.title
                );
            })
        }
    }
}

fn print_listing(l: &Listing) {
    println!("Listing {}  {}", l.id.as_str().yellow().bold(), l.title.bold());
    println!("  Location: {}", l.location);
    println!("  Price: {:.2}/night, up to {} guests", l.price_per_night, l.capacity);
    if let Some(host) = &l.host_email {
        println!("  Host: {}", host.cyan());
    }
    if !l.description.is_empty() {
        println!("  {}", l.description);
    }
    println!("  Images: {}", image_line(l));
    println!("  Created: {}", short_time(l.created_at).dimmed());
}

// ---- Jobs ----

async fn cmd_job(nook: &Nook, out: Output, action: JobAction) -> anyhow::Result<()> {
    match action {
        JobAction::Add {
            title,
            company,
            location,
            description,
            salary,
            contract,
            contact,
            image,
            images,
        } => {
            let job = nook
                .add_job(JobDraft {
                    title,
                    company,
                    location,
                    description,
                    salary,
                    contract_type: contract,
                    contact_email: contact,
                    image,
                    images,
                })
                .await?;
            out.emit(&job, || {
                println!(
                    "{} Created job {} {}",
                    "✓".green().bold(),
                    job.id.short_id().yellow(),
                    job.title.bold()
                );
            })
        }
        JobAction::List => {
            let jobs = nook.list_jobs().await?;
            out.emit(&jobs, || {
                if jobs.is_empty() {
                    println!("No jobs.");
                }
                for j in &jobs {
                    println!(
                        "{}  {}  {} ({})",
                        j.id.short_id().yellow(),
                        j.title.bold(),
                        j.company,
                        j.location
                    );
                }
            })
        }
        JobAction::Show { id } => {
            let job = nook.job(&parse_id(&id)?).await?;
            out.emit(&job, || print_job(&job))
        }
        JobAction::Delete { id } => {
            let removed = nook.delete_job(&parse_id(&id)?).await?;
            out.emit(&removed, || {
                println!(
                    "{} Deleted job {} {}",
                    "✓".green(),
                    removed.id.short_id().yellow(),
                    removed.title
                );
            })
        }
    }
}

fn print_job(j: &Job) {
    println!("Job {}  {}", j.id.as_str().yellow().bold(), j.title.bold());
    println!("  Company: {}", j.company);
    println!("  Location: {}", j.location);
    if let Some(salary) = &j.salary {
        println!("  Salary: {salary}");
    }
    if let Some(contract) = &j.contract_type {
        println!("  Contract: {contract}");
    }
    if let Some(contact) = &j.contact_email {
        println!("  Contact: {}", contact.cyan());
    }
    println!("  Images: {}", image_line(j));
    println!("  Created: {}", short_time(j.created_at).dimmed());
}

// ---- Reservations ----

async fn cmd_reservation(
    nook: &Nook,
    out: Output,
    action: ReservationAction,
) -> anyhow::Result<()> {
    match action {
        ReservationAction::Add {
            listing,
            guest,
            email,
            check_in,
            check_out,
            guests,
        } => {
            let reservation = nook
                .add_reservation(ReservationDraft {
                    listing_id: parse_id(&listing)?,
                    guest_name: guest,
                    guest_email: email,
                    check_in: parse_date(&check_in)?,
                    check_out: parse_date(&check_out)?,
                    guests,
                })
                .await?;
            out.emit(&reservation, || {
                println!(
                    "{} Reserved {} nights for {} ({})",
                    "✓".green().bold(),
                    reservation.nights(),
                    reservation.guest_name.bold(),
                    reservation.status.to_string().yellow()
                );
                println!("  Reservation: {}", reservation.id.as_str().yellow());
            })
        }
        ReservationAction::List { listing } => {
            let reservations = match listing {
                Some(id) => nook.reservations_for_listing(&parse_id(&id)?).await?,
                None => nook.list_reservations().await?,
            };
            out.emit(&reservations, || {
                if reservations.is_empty() {
                    println!("No reservations.");
                }
                for r in &reservations {
                    let status = match r.status {
                        ReservationStatus::Pending => r.status.to_string().yellow(),
                        ReservationStatus::Confirmed => r.status.to_string().green(),
                        ReservationStatus::Cancelled => r.status.to_string().red(),
                    };
                    println!(
                        "{}  {} -> {}  {}  listing {}  {}",
                        r.id.short_id().yellow(),
                        r.check_in,
                        r.check_out,
                        r.guest_name.bold(),
                        r.listing_id.short_id(),
                        status
                    );
                }
            })
        }
        ReservationAction::Confirm { id } => {
            set_status(nook, out, &id, ReservationStatus::Confirmed).await
        }
        ReservationAction::Cancel { id } => {
            set_status(nook, out, &id, ReservationStatus::Cancelled).await
        }
    }
}

async fn set_status(
    nook: &Nook,
    out: Output,
    id: &str,
    status: ReservationStatus,
) -> anyhow::Result<()> {
    let reservation = nook.set_reservation_status(&parse_id(id)?, status).await?;
    out.emit(&reservation, || {
        println!(
            "{} Reservation {} is now {}",
            "✓".green(),
            reservation.id.short_id().yellow(),
            status.to_string().bold()
        );
    })
}

// ---- Users ----

/// A user without credential material.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView<'a> {
    id: &'a EntityId,
    email: &'a str,
    name: &'a str,
    role: Role,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_reset_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(u: &'a User) -> Self {
        Self {
            id: &u.id,
            email: &u.email,
            name: &u.name,
            role: u.role,
            created_at: u.created_at,
            password_reset_at: u.password_reset_at,
        }
    }
}

async fn cmd_user(nook: &Nook, out: Output, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::Add {
            email,
            name,
            admin,
            password,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(|| nook.security().generate_password());
            let role = if admin { Role::Admin } else { Role::User };
            let user = nook.register_user(&email, &name, role, &password).await?;
            out.emit(&UserView::from(&user), || {
                println!(
                    "{} Registered {} <{}>",
                    "✓".green().bold(),
                    user.name.bold(),
                    user.email.cyan()
                );
                if generated {
                    println!("  Password: {}", password.yellow().bold());
                }
            })
        }
        UserAction::List => {
            let users = nook.users().list().await?;
            let views: Vec<UserView<'_>> = users.iter().map(UserView::from).collect();
            out.emit(&views, || {
                if users.is_empty() {
                    println!("No users.");
                }
                for u in &users {
                    let role = match u.role {
                        Role::Admin => "admin".magenta(),
                        Role::User => "user".normal(),
                    };
                    println!(
                        "{}  {}  {}  {}",
                        u.id.short_id().yellow(),
                        u.email.cyan(),
                        u.name,
                        role
                    );
                }
            })
        }
    }
}

// ---- Images ----

#[derive(Serialize)]
struct ResolvedView {
    image: Option<String>,
    images: Vec<String>,
    primary_origin: String,
    gallery_origin: String,
}

fn origin_label(origin: ImageOrigin) -> &'static str {
    match origin {
        ImageOrigin::Record => "record",
        ImageOrigin::EntityBucket => "entity bucket",
        ImageOrigin::LatestBucket => "latest upload",
        ImageOrigin::Gallery => "first gallery image",
        ImageOrigin::Placeholder => "placeholder",
        ImageOrigin::Missing => "missing",
    }
}

async fn cmd_images(nook: &Nook, out: Output, action: ImagesAction) -> anyhow::Result<()> {
    match action {
        ImagesAction::Resolve { kind, id } => {
            let kind: EntityKind = kind.parse()?;
            let id = parse_id(&id)?;
            let view = match kind {
                EntityKind::Job => {
                    let job = nook
                        .jobs()
                        .get_by_id(&id)
                        .await?
                        .with_context(|| format!("no job {id}"))?;
                    resolved_view(nook.resolve_images(&job).await)
                }
                EntityKind::Listing => {
                    let listing = nook
                        .listings()
                        .get_by_id(&id)
                        .await?
                        .with_context(|| format!("no listing {id}"))?;
                    resolved_view(nook.resolve_images(&listing).await)
                }
                other => bail!("{other} records carry no images"),
            };
            out.emit(&view, || {
                println!(
                    "Primary: {} ({})",
                    view.image.as_deref().unwrap_or("-").cyan(),
                    view.primary_origin.dimmed()
                );
                println!("Gallery ({}):", view.gallery_origin.dimmed());
                for img in &view.images {
                    println!("  {}", img.cyan());
                }
            })
        }
        ImagesAction::Save { kind, id, images } => {
            let saved = nook.images().save_images(kind.parse()?, &parse_id(&id)?, &images).await?;
            out.emit(&saved, || report_saved(saved, images.len()))
        }
        ImagesAction::Clear { kind, id } => {
            let cleared = nook.images().clear_images(kind.parse()?, &parse_id(&id)?).await?;
            out.emit(&cleared, || {
                if cleared {
                    println!("{} Image bucket cleared", "✓".green());
                } else {
                    println!("No image bucket.");
                }
            })
        }
        ImagesAction::Purge => {
            let removed = nook.images().purge_all_images().await?;
            out.emit(&removed, || {
                println!("{} Purged {} image keys", "✓".green(), removed.to_string().bold())
            })
        }
        ImagesAction::Latest { kind, images } => {
            let saved = nook.images().record_latest_upload(kind.parse()?, &images).await?;
            out.emit(&saved, || report_saved(saved, images.len()))
        }
    }
}

fn resolved_view<E: Illustrated>(resolution: nook_sdk::Resolution<E>) -> ResolvedView {
    ResolvedView {
        image: resolution.entity.image().map(str::to_string),
        images: resolution.entity.images().to_vec(),
        primary_origin: origin_label(resolution.primary).to_string(),
        gallery_origin: origin_label(resolution.gallery).to_string(),
    }
}

fn report_saved(saved: usize, offered: usize) {
    if saved == 0 {
        println!(
            "{} Nothing saved: no persistable reference among {}",
            "!".yellow().bold(),
            offered
        );
    } else {
        println!("{} Saved {} of {} references", "✓".green(), saved.to_string().bold(), offered);
    }
}

// ---- Security ----

async fn cmd_reset(nook: &Nook, out: Output, action: ResetAction) -> anyhow::Result<()> {
    let security = nook.security();
    match action {
        ResetAction::Request { email, user_agent } => {
            let client = user_agent.map(ClientContext::new).unwrap_or_default();
            security.request_reset(&email, client).await;
            out.emit(&serde_json::json!({ "requested": true }), || {
                println!(
                    "{} If an account exists for {}, an administrator will reset it.",
                    "✓".green(),
                    email.cyan()
                );
            })
        }
        ResetAction::Fulfill {
            email,
            password,
            actor,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(|| security.generate_password());
            let user = security
                .fulfill_reset(&email, &password, &actor, ClientContext::new("nook-cli"))
                .await?;
            out.emit(&UserView::from(&user), || {
                println!("{} Password reset for {}", "✓".green().bold(), user.email.cyan());
                if generated {
                    println!("  New password: {}", password.yellow().bold());
                }
            })
        }
        ResetAction::List { filter, pending } => {
            let requests = if pending {
                security.pending_requests().await?
            } else {
                security.reset_requests(filter.as_deref()).await?
            };
            out.emit(&requests, || {
                if requests.is_empty() {
                    println!("No reset requests.");
                }
                for r in &requests {
                    let state = if r.fulfilled { "fulfilled".green() } else { "pending".yellow() };
                    println!(
                        "{}  {}  {}",
                        short_time(r.requested_at).dimmed(),
                        r.email.cyan(),
                        state
                    );
                }
            })
        }
        ResetAction::Log => {
            let log = security.audit_log().await?;
            out.emit(&log, || {
                if log.is_empty() {
                    println!("Audit log is empty.");
                }
                for e in &log {
                    let actor = e.actor.as_deref().map(|a| format!(" by {a}")).unwrap_or_default();
                    println!(
                        "{}  {}  {}{}",
                        short_time(e.timestamp).dimmed(),
                        e.kind.to_string().bold(),
                        e.email.cyan(),
                        actor
                    );
                }
            })
        }
    }
}

async fn cmd_login(nook: &Nook, out: Output, action: LoginAction) -> anyhow::Result<()> {
    let security = nook.security();
    let throttle = security.throttle();
    match action {
        LoginAction::Try { email, password } => {
            let user = security.authenticate(&email, &password).await?;
            out.emit(&UserView::from(&user), || {
                println!("{} Signed in as {}", "✓".green().bold(), user.name.bold());
            })
        }
        LoginAction::Fail { email } => {
            let record = throttle.record_failure(&email).await?;
            out.emit(&record, || match record.lock_until {
                Some(until) => println!(
                    "{} {} failures; locked until {}",
                    "✗".red().bold(),
                    record.count,
                    short_time(until).bold()
                ),
                None => println!(
                    "{} failure(s) recorded for {}",
                    record.count.to_string().bold(),
                    email.cyan()
                ),
            })
        }
        LoginAction::Success { email } => {
            throttle.record_success(&email).await?;
            out.emit(&serde_json::json!({ "cleared": true }), || {
                println!("{} Attempts cleared for {}", "✓".green(), email.cyan());
            })
        }
        LoginAction::Status { email } => {
            let record = throttle.record(&email).await?;
            let locked_until = throttle.check(&email).await?;
            out.emit(&record, || match (&record, locked_until) {
                (_, Some(until)) => {
                    println!("{} Locked until {}", "✗".red().bold(), short_time(until).bold())
                }
                (Some(r), None) => println!("{} failure(s), not locked", r.count),
                (None, None) => println!("No failed logins."),
            })
        }
    }
}

fn cmd_password(nook: &Nook, out: Output, action: PasswordAction) -> anyhow::Result<()> {
    match action {
        PasswordAction::Generate { count } => {
            let passwords: Vec<String> = (0..count.max(1))
                .map(|_| nook.security().generate_password())
                .collect();
            out.emit(&passwords, || {
                for p in &passwords {
                    println!("{p}");
                }
            })
        }
    }
}

// ---- Maintenance ----

#[derive(Serialize)]
struct HealthView {
    kind: EntityKind,
    key: String,
    entities: Option<usize>,
    error: Option<String>,
}

async fn cmd_verify(nook: &Nook, out: Output) -> anyhow::Result<()> {
    let report = nook.verify().await?;
    let views: Vec<HealthView> = report
        .iter()
        .map(|h| HealthView {
            kind: h.kind,
            key: h.key.clone(),
            entities: h.status.as_ref().ok().copied(),
            error: h.status.as_ref().err().map(|e| e.to_string()),
        })
        .collect();
    out.emit(&views, || {
        for v in &views {
            match (&v.entities, &v.error) {
                (Some(n), _) => println!("{} {}  {} entities", "✓".green(), v.key.bold(), n),
                (None, Some(e)) => println!("{} {}  {}", "✗".red().bold(), v.key.bold(), e.red()),
                (None, None) => {}
            }
        }
    })?;
    let corrupt = views.iter().filter(|v| v.error.is_some()).count();
    if corrupt > 0 {
        bail!("{corrupt} collection(s) do not decode; the next write to each resets it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_iso() {
        assert_eq!(parse_date("2024-06-01").unwrap(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(parse_date("01/06/2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn ids_must_be_well_formed() {
        assert!(parse_id("").is_err());
        let id = EntityId::generate();
        assert_eq!(parse_id(id.as_str()).unwrap(), id);
    }

    #[test]
    fn every_origin_has_a_label() {
        let origins = [
            ImageOrigin::Record,
            ImageOrigin::EntityBucket,
            ImageOrigin::LatestBucket,
            ImageOrigin::Gallery,
            ImageOrigin::Placeholder,
            ImageOrigin::Missing,
        ];
        let labels: std::collections::HashSet<_> =
            origins.iter().map(|o| origin_label(*o)).collect();
        assert_eq!(labels.len(), origins.len());
    }
}
