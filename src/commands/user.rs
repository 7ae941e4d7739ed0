//! User lifecycle commands.
//!
//! Each handler takes the reconciler and the loaded state file, so the same
//! code runs against Airflow or an in-memory directory.

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use rayon::prelude::*;
use std::collections::BTreeMap;

use airflow::{Directory, UserRecord};
use userkit::{Reconciler, UserState};

use crate::Context;
use crate::cli::{Command, DeclaredArgs, ReadArgs};
use crate::desired::UsersFile;
use crate::progress;
use crate::state::StateFile;
use crate::ui;

/// Run a user command against the configured Airflow instance
pub fn run(ctx: &Context, command: Command) -> Result<()> {
    let reconciler = ctx.reconciler()?;
    let mut state = ctx.load_state()?;

    match command {
        Command::Create(args) => create(ctx, &reconciler, &mut state, &args),
        Command::Read(args) => read(ctx, &reconciler, &mut state, args),
        Command::Update(args) => update(ctx, &reconciler, &mut state, &args),
        Command::Delete { email, yes } => delete(ctx, &reconciler, &mut state, &email, yes),
        Command::Import { email } => import(ctx, &reconciler, &mut state, &email),
        Command::List { json } => list(ctx, &reconciler, &state, json),
        Command::Completions { .. } => bail!("completions do not talk to Airflow"),
    }
}

// ============================================================================
// Create / Update
// ============================================================================

pub fn create<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &mut StateFile,
    args: &DeclaredArgs,
) -> Result<()> {
    if state.is_managed(&args.email) {
        bail!(
            "{} is already managed; use `update` to change it",
            args.email
        );
    }

    let users = UsersFile::load(&args.file)?;
    let declared = users.declared(&args.email)?;

    let user = match reconciler.create(declared) {
        Ok(user) => user,
        Err(e) => {
            // The user exists in Airflow; losing it here would orphan it.
            if let Some(created) = e.created_state() {
                state.record(&args.email, created.clone());
                state.save()?;
                if !ctx.quiet {
                    ui::warn(&format!(
                        "{} was created and is now managed; run `read` once Airflow responds",
                        args.email
                    ));
                }
            }
            return Err(e.into());
        }
    };
    if !user.exists() {
        bail!(
            "Created {} but Airflow did not list it on read-back",
            args.email
        );
    }

    if !ctx.quiet {
        ui::success(&format!("Created {}", args.email));
        print_user(&user);
    }
    state.record(&args.email, user);
    state.save()
}

pub fn update<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &mut StateFile,
    args: &DeclaredArgs,
) -> Result<()> {
    let mut user = managed(state, &args.email)?;

    let users = UsersFile::load(&args.file)?;
    let declared = users.declared(&args.email)?;

    reconciler.read(&mut user)?;
    if !user.exists() {
        state.forget(&args.email);
        state.save()?;
        bail!(
            "{} no longer exists in Airflow; use `create` to recreate it",
            args.email
        );
    }

    let fields = declared.replacement_fields(&user);
    if !fields.is_empty() {
        bail!(
            "Changing {} of {} requires replacing the user (Airflow has username {}); delete and create it instead",
            fields.join(", "),
            args.email,
            user.username
        );
    }

    reconciler.update(&mut user, declared)?;

    if !ctx.quiet {
        ui::success(&format!("Updated {}", args.email));
        print_user(&user);
    }
    state.record(&args.email, user);
    state.save()
}

// ============================================================================
// Read
// ============================================================================

/// Refresh managed users in parallel, dropping the ones Airflow no longer has
pub fn read<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &mut StateFile,
    args: ReadArgs,
) -> Result<()> {
    let emails = if args.emails.is_empty() {
        state.emails()
    } else {
        args.emails
    };

    if emails.is_empty() {
        if !ctx.quiet && !args.json {
            ui::info("No managed users");
        }
        return Ok(());
    }

    let targets = emails
        .into_iter()
        .map(|email| managed(state, &email).map(|user| (email, user)))
        .collect::<Result<Vec<_>>>()?;

    let pb = progress::bar(targets.len() as u64, "Reading", ctx.quiet || args.json);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.max(1))
        .build()
        .context("Failed to build thread pool")?;

    let results: Vec<(String, userkit::Result<UserState>)> = pool.install(|| {
        targets
            .into_par_iter()
            .map(|(email, mut user)| {
                let result = reconciler.read(&mut user).map(|()| user);
                pb.set_message(email.clone());
                pb.inc(1);
                (email, result)
            })
            .collect()
    });
    pb.finish_and_clear();

    let mut refreshed = BTreeMap::new();
    let mut removed = Vec::new();
    let mut failed = Vec::new();

    for (email, result) in results {
        match result {
            Ok(user) if user.exists() => {
                refreshed.insert(email.clone(), user.clone());
                state.record(&email, user);
            }
            Ok(_) => {
                state.forget(&email);
                removed.push(email);
            }
            Err(e) => failed.push((email, e)),
        }
    }
    state.save()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&refreshed)?);
    } else if !ctx.quiet {
        ui::header("Managed users");
        for (email, user) in &refreshed {
            println!("  {} {} {}", "✓".green(), email, user.username.dimmed());
        }
        for email in &removed {
            ui::warn(&format!("{email} is gone from Airflow and no longer managed"));
        }
    }

    if !failed.is_empty() {
        for (email, e) in &failed {
            ui::error(&format!("{email}: {e}"));
        }
        bail!("Failed to read {} of the users", failed.len());
    }

    Ok(())
}

// ============================================================================
// Delete / Import
// ============================================================================

pub fn delete<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &mut StateFile,
    email: &str,
    yes: bool,
) -> Result<()> {
    let mut user = managed(state, email)?;

    // Pick up a rewritten username before addressing the user.
    reconciler.read(&mut user)?;
    if !user.exists() {
        state.forget(email);
        state.save()?;
        if !ctx.quiet {
            ui::info(&format!("{email} was already gone from Airflow"));
        }
        return Ok(());
    }

    if !yes && !confirm_delete(email, &user.username)? {
        ui::info("Cancelled");
        return Ok(());
    }

    reconciler.delete(&mut user)?;
    state.forget(email);
    state.save()?;

    if !ctx.quiet {
        ui::success(&format!("Deleted {email}"));
    }
    Ok(())
}

pub fn import<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &mut StateFile,
    email: &str,
) -> Result<()> {
    if state.is_managed(email) {
        bail!("{email} is already managed");
    }

    let user = reconciler.import(email)?;
    if !user.exists() {
        bail!("No Airflow user has e-mail {email}");
    }

    if !ctx.quiet {
        ui::success(&format!("Imported {email}"));
        print_user(&user);
    }
    state.record(email, user);
    state.save()
}

// ============================================================================
// List
// ============================================================================

/// Print every user Airflow has, marking the managed ones
pub fn list<D: Directory>(
    ctx: &Context,
    reconciler: &Reconciler<D>,
    state: &StateFile,
    json: bool,
) -> Result<()> {
    let users = reconciler.cache().snapshot(reconciler.directory())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        ui::info("Airflow has no users");
        return Ok(());
    }

    println!(
        "{:<3} {:<32} {:<28} {:<24} {:<7}",
        "", "EMAIL".bold(), "USERNAME".bold(), "ROLES".bold(), "ACTIVE".bold()
    );
    for user in &users {
        print_row(user, state.is_managed(&user.email));
        if ctx.verbose > 0 {
            ui::dim(&format!(
                "logins {} (failed {}), last login {}",
                ui::or_dash(user.login_count),
                ui::or_dash(user.failed_login_count),
                ui::or_dash(user.last_login.as_deref()),
            ));
        }
    }

    let managed_count = users.iter().filter(|u| state.is_managed(&u.email)).count();
    println!();
    ui::dim(&format!("{} users, {managed_count} managed", users.len()));
    Ok(())
}

fn print_row(user: &UserRecord, managed: bool) {
    let marker = if managed { "●".green() } else { "○".dimmed() };
    let roles = user
        .role_refs()
        .iter()
        .filter_map(|r| r.name.as_deref())
        .collect::<Vec<_>>()
        .join(",");
    let active = match user.active {
        Some(true) => "yes".green(),
        Some(false) => "no".red(),
        None => "-".dimmed(),
    };
    println!(
        "{:<3} {:<32} {:<28} {:<24} {:<7}",
        marker,
        ui::truncate(&user.email, 32),
        ui::truncate(&user.username, 28),
        ui::truncate(&roles, 24),
        active
    );
}

// ============================================================================
// Helpers
// ============================================================================

/// State of a managed user, or an error telling how to start managing it
fn managed(state: &StateFile, email: &str) -> Result<UserState> {
    state
        .get(email)
        .filter(|user| user.exists())
        .cloned()
        .with_context(|| format!("{email} is not managed; use `create` or `import` first"))
}

fn print_user(user: &UserState) {
    ui::kv("Username", &user.username);
    ui::kv("Name", &format!("{} {}", user.first_name, user.last_name));
    ui::kv(
        "Roles",
        &user.roles.iter().cloned().collect::<Vec<_>>().join(", "),
    );
    ui::kv("Active", &ui::or_dash(user.active));
    ui::kv("Logins", &ui::or_dash(user.login_count));
}

fn confirm_delete(email: &str, username: &str) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(format!("Delete Airflow user {email} (username {username})?"))
        .default(false)
        .interact()?;

    Ok(confirmed)
}
