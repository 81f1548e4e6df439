use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::{error, warn};
use structopt::StructOpt;

use satnica::api::{Api, NewHours, ProfileForm};
use satnica::auth::{sha1_hex, CredentialStore, HashedCredentials};
use satnica::cache::{UserCache, HOURS_BY_DATE, SELECTED_DATE};
use satnica::store::Store;
use satnica::timesheet::{display_key, Timesheet, DISPLAY_FORMAT, WIRE_FORMAT};
use satnica::week::{WeekCursor, WeekWindow};

#[derive(Debug, StructOpt)]
#[structopt(name = "satnica", about = "Work hours tracking client")]
enum Command {
    /// Log in against the remote API and keep the session
    Login { username: String, password: String },
    /// Drop the session and its cached data
    Logout,
    /// Show the timesheet for an ISO week
    Week {
        /// Signed week offset relative to the current ISO week
        #[structopt(short, long, default_value = "0", allow_hyphen_values = true)]
        offset: i64,
    },
    /// Select the working date used by `add`
    Select { date: String },
    /// Record worked hours against a work type and location
    Add {
        hours: f64,
        #[structopt(long = "type")]
        work_type: String,
        #[structopt(long)]
        location: String,
        /// Defaults to the selected date
        #[structopt(long)]
        date: Option<String>,
    },
    /// Delete a recorded hour entry by its server id
    Delete {
        id: i64,
        /// Defaults to the selected date
        #[structopt(long)]
        date: Option<String>,
        /// Skip the confirmation prompt
        #[structopt(long)]
        yes: bool,
    },
    /// List the locations assigned to the user
    Locations,
    /// List the available work types
    Types,
    /// Show the user profile
    Profile,
    /// Update the user profile
    ProfileUpdate {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        surname: String,
        #[structopt(long)]
        phone: String,
        #[structopt(long)]
        email: String,
        #[structopt(long)]
        address: String,
        #[structopt(long)]
        clothes_size: String,
        #[structopt(long)]
        footwear_size: String,
        #[structopt(long)]
        date_of_birth: String,
    },
    /// Hours per location over a date range
    Report {
        start: String,
        end: String,
        location: String,
    },
}

fn main() {
    pretty_env_logger::init();
    let command = Command::from_args();
    if let Err(e) = run(command) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    let store = Store::open_default()?;
    let mut auth = CredentialStore::new(store);
    let api = Api::new();

    match command {
        Command::Login { username, password } => login(&api, &mut auth, &username, &password),
        Command::Logout => logout(&mut auth),
        command => {
            if !auth.is_authenticated() {
                bail!("Not logged in. Run `satnica login` first.");
            }
            match command {
                Command::Week { offset } => week(&api, &mut auth, offset),
                Command::Select { date } => select(&mut auth, &date),
                Command::Add {
                    hours,
                    work_type,
                    location,
                    date,
                } => add(&api, &mut auth, hours, work_type, location, date),
                Command::Delete { id, date, yes } => delete(&api, &mut auth, id, date, yes),
                Command::Locations => locations(&api, &auth),
                Command::Types => types(&api, &auth),
                Command::Profile => profile(&api, &auth),
                Command::ProfileUpdate {
                    name,
                    surname,
                    phone,
                    email,
                    address,
                    clothes_size,
                    footwear_size,
                    date_of_birth,
                } => profile_update(
                    &api,
                    &auth,
                    ProfileForm {
                        name,
                        surname,
                        phone,
                        email,
                        address,
                        clothes_size,
                        footwear_size,
                        date_of_birth,
                    },
                ),
                Command::Report {
                    start,
                    end,
                    location,
                } => report(&api, &auth, &start, &end, &location),
                Command::Login { .. } | Command::Logout => unreachable!(),
            }
        }
    }
}

fn login(api: &Api, auth: &mut CredentialStore, username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        bail!("Username and password must not be empty");
    }
    // The server only ever sees the digests, never the raw pair
    let hashed = HashedCredentials {
        username: sha1_hex(username),
        password: sha1_hex(password),
    };
    let accepted = api
        .login(&hashed)
        .context("An error occurred. Please try again later.")?;
    if !accepted {
        bail!("Login failed. Please check your credentials.");
    }
    auth.login(username, password);
    println!("Logged in as {}", username);
    Ok(())
}

fn logout(auth: &mut CredentialStore) -> Result<()> {
    // Cached timesheet data does not outlive the session
    if auth.is_authenticated() {
        UserCache::new(auth).clear();
    }
    auth.logout();
    println!("Logged out");
    Ok(())
}

fn week(api: &Api, auth: &mut CredentialStore, offset: i64) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let mut offset = offset;
    let mut cursor = WeekCursor::default();
    let mut timesheet: Timesheet = UserCache::new(auth).load(HOURS_BY_DATE).unwrap_or_default();

    loop {
        let window = WeekWindow::from_offset(offset)?;
        // Navigating back to the already loaded week is a no-op
        if cursor.needs_reload(&window) {
            let rows = api
                .fetch_hours(&credentials, window.start, window.end)
                .context("Failed to load hours. Please try again later.")?;
            timesheet.apply_server_hours(rows);
            cursor.mark_loaded(&window);
            UserCache::new(auth).save(HOURS_BY_DATE, &timesheet);
        }
        render_week(&window, &timesheet, selected_date(auth));

        print!("[n]ext, [p]revious or [q]uit: ");
        io::stdout().flush()?;
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer)? == 0 {
            // No terminal attached, render once and leave
            break;
        }
        match answer.trim() {
            "n" => offset = offset.saturating_add(1),
            "p" => offset = offset.saturating_sub(1),
            "" | "q" => break,
            other => println!("Unknown choice {:?}", other),
        }
    }
    Ok(())
}

fn render_week(window: &WeekWindow, timesheet: &Timesheet, selected: Option<NaiveDate>) {
    println!(
        "Week {} - {}",
        display_key(window.start),
        display_key(window.end)
    );
    for day in &window.days {
        let key = display_key(*day);
        let marker = if selected == Some(*day) { "*" } else { " " };
        match timesheet.day(&key) {
            Some(summary) => {
                println!("{} {}  {}h", marker, key, summary.sum);
                for entry in &summary.hours {
                    if entry.is_pending() {
                        println!("      [pending] {}h", entry.hours);
                    } else {
                        println!("      [{}] {}h", entry.id, entry.hours);
                    }
                }
            }
            None => println!("{} {}  -", marker, key),
        }
    }
}

fn select(auth: &mut CredentialStore, input: &str) -> Result<()> {
    let date = parse_date(input)?;
    UserCache::new(auth).save(SELECTED_DATE, &date.format(WIRE_FORMAT).to_string());
    println!("Selected {}", display_key(date));
    Ok(())
}

fn add(
    api: &Api,
    auth: &mut CredentialStore,
    hours: f64,
    work_type: String,
    location: String,
    date: Option<String>,
) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let date = match date {
        Some(input) => parse_date(&input)?,
        None => selected_date(auth)
            .context("No date selected. Run `satnica select` or pass --date.")?,
    };
    // Form validation happens before any remote call
    if work_type.trim().is_empty() || location.trim().is_empty() {
        bail!("Please fill out all required fields before submitting.");
    }
    if !hours.is_finite() || hours <= 0.0 {
        bail!("Hours must be a positive number");
    }

    let form = NewHours {
        date: date.format(WIRE_FORMAT).to_string(),
        work_type,
        location,
        hours: hours.to_string(),
    };
    api.add_hours(&credentials, &form)
        .context("There was an error submitting the form. Please try again later.")?;

    // Optimistic local append; the sentinel id stays until the next reload
    let mut timesheet: Timesheet = UserCache::new(auth).load(HOURS_BY_DATE).unwrap_or_default();
    timesheet.add(date, hours);
    UserCache::new(auth).save(HOURS_BY_DATE, &timesheet);
    println!("Recorded {}h on {}", hours, display_key(date));
    Ok(())
}

fn delete(
    api: &Api,
    auth: &mut CredentialStore,
    id: i64,
    date: Option<String>,
    yes: bool,
) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let date = match date {
        Some(input) => parse_date(&input)?,
        None => selected_date(auth)
            .context("No date selected. Run `satnica select` or pass --date.")?,
    };

    let mut timesheet: Timesheet = UserCache::new(auth).load(HOURS_BY_DATE).unwrap_or_default();
    let entry = timesheet
        .find(date, id)
        .with_context(|| format!("Hour entry {} not found on {}", id, display_key(date)))?;
    let hours = entry.hours;

    if !yes {
        let question = format!(
            "Are you sure you want to delete {} worked hours on {}?",
            hours,
            display_key(date)
        );
        if !confirm(&question)? {
            println!("Cancelled");
            return Ok(());
        }
    }

    // Optimistic removal, compensated below when the server call fails
    let removed = timesheet
        .remove(date, id)
        .with_context(|| format!("Hour entry {} not found on {}", id, display_key(date)))?;
    UserCache::new(auth).save(HOURS_BY_DATE, &timesheet);

    match api.delete_hours(&credentials, id) {
        Ok(()) => {
            println!("Deleted {}h on {}", hours, display_key(date));
            Ok(())
        }
        Err(e) => {
            timesheet.restore(removed);
            UserCache::new(auth).save(HOURS_BY_DATE, &timesheet);
            Err(e.context("Failed to delete hour. Please try again."))
        }
    }
}

fn locations(api: &Api, auth: &CredentialStore) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let locations = api
        .fetch_locations(&credentials)
        .context("Failed to load locations. Please try again later.")?;
    for location in locations {
        println!("[{}] {}", location.id, location.title);
    }
    Ok(())
}

fn types(api: &Api, auth: &CredentialStore) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let types = api
        .fetch_types(&credentials)
        .context("Failed to load work types. Please try again later.")?;
    for work_type in types {
        println!("[{}] {}", work_type.value, work_type.title);
    }
    Ok(())
}

fn profile(api: &Api, auth: &CredentialStore) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let profile = api
        .fetch_profile(&credentials)
        .context("An error occurred while fetching user data. Please try again later.")?;
    println!("Name:          {} {}", profile.name, profile.surname);
    println!("Phone:         {}", profile.phone);
    println!("Email:         {}", profile.email);
    println!("Address:       {}", profile.address);
    println!("Clothes size:  {}", profile.clothes_size);
    println!("Footwear size: {}", profile.footwear_size);
    println!("Date of birth: {}", profile.date_of_birth);
    Ok(())
}

fn profile_update(api: &Api, auth: &CredentialStore, form: ProfileForm) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let fields = [
        &form.name,
        &form.surname,
        &form.phone,
        &form.email,
        &form.address,
        &form.clothes_size,
        &form.footwear_size,
        &form.date_of_birth,
    ];
    if fields.iter().any(|f| f.trim().is_empty()) {
        bail!("Please fill out all required fields before submitting.");
    }
    api.update_profile(&credentials, &form)
        .context("There was an error submitting the form. Please try again later.")?;
    println!("Profile updated");
    Ok(())
}

fn report(api: &Api, auth: &CredentialStore, start: &str, end: &str, location: &str) -> Result<()> {
    let credentials = require_credentials(auth)?;
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let rows = api
        .hours_by_location(&credentials, start, end, location)
        .context("There was an error fetching the data. Please try again later.")?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn require_credentials(auth: &CredentialStore) -> Result<HashedCredentials> {
    auth.hashed_credentials()
        .context("Failed to retrieve credentials. Run `satnica login` first.")
}

fn selected_date(auth: &mut CredentialStore) -> Option<NaiveDate> {
    let saved: String = UserCache::new(auth).load(SELECTED_DATE)?;
    match NaiveDate::parse_from_str(&saved, WIRE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring unparseable selected date {:?}: {}", saved, e);
            None
        }
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, WIRE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, DISPLAY_FORMAT))
        .with_context(|| {
            format!(
                "Unrecognised date {:?}, expected YYYY-MM-DD or DD.MM.YYYY",
                input
            )
        })
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
