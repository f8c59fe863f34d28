use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};

use strikebase::auth;
use strikebase::config::{self, Config};
use strikebase::datastore::{Datastore, open_datastore};
use strikebase::fighter::{Fighter, User};
use strikebase::logging;
use strikebase::market::{self, MarketError};
use strikebase::profiles::{self, Dashboard};
use strikebase::rating::{rating, simulate_bout};
use strikebase::roster::{self, ALL_DIVISIONS};

const USAGE: &str = "usage: strikebase <command> [args]

commands:
  roster [--division NAME] [--search TEXT]   list fighters, most wins first
  fighter <id>                               fighter profile
  search <text>                              quick name search (2+ chars)
  arena <fighter> <fighter>                  simulate a bout (id or name)
  market                                     fighters on the open market
  buy <fighter-id>                           buy a fighter from the market
  signup <email> <password>                  create an account
  login <email> <password>                   sign in
  logout                                     sign out
  setup <manager-name> <gym-name>            create your manager profile
  settings --manager NAME --gym NAME         update your manager profile
  dashboard                                  your cash and fighters

global: --db PATH (use the embedded SQLite store at PATH)";

struct Cli {
    store: Box<dyn Datastore>,
    session_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    config::load_dotenv();
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = take_value_arg(&mut args, "--db").map(PathBuf::from);
    let Some(command) = args.first().cloned() else {
        println!("{USAGE}");
        return Ok(());
    };
    let rest = &args[1..];

    let mut config = Config::from_env()?;
    if let Some(path) = db_path {
        config = config.with_sqlite_path(path);
    }
    let mut cli = Cli {
        store: open_datastore(&config)?,
        session_path: auth::default_session_path(),
    };

    match command.as_str() {
        "roster" => cli.roster(rest),
        "fighter" => cli.fighter(rest),
        "search" => cli.search(rest),
        "arena" => cli.arena(rest),
        "market" => cli.market(),
        "buy" => cli.buy(rest),
        "signup" => cli.signup(rest),
        "login" => cli.login(rest),
        "logout" => cli.logout(),
        "setup" => cli.setup(rest),
        "settings" => cli.settings(rest),
        "dashboard" => cli.dashboard(),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(anyhow!("unknown command {other:?}\n\n{USAGE}")),
    }
}

impl Cli {
    fn store(&mut self) -> &mut dyn Datastore {
        self.store.as_mut()
    }

    fn current_user(&mut self) -> Result<User> {
        let session = self
            .session_path
            .as_deref()
            .and_then(auth::load_session)
            .ok_or_else(|| anyhow!("not signed in; run `strikebase login`"))?;
        profiles::resume_session(self.store.as_mut(), &session)?
            .ok_or_else(|| anyhow!("session expired; run `strikebase login`"))
    }

    fn remember(&self, session: &strikebase::fighter::Session) -> Result<()> {
        let path = self
            .session_path
            .as_deref()
            .ok_or_else(|| anyhow!("no cache directory for the session file"))?;
        auth::save_session(path, session)
    }

    fn roster(&mut self, args: &[String]) -> Result<()> {
        let mut args = args.to_vec();
        let division = match take_value_arg(&mut args, "--division") {
            Some(raw) => roster::canonical_division(&raw)
                .ok_or_else(|| anyhow!("unknown division {raw:?}; one of {:?}", roster::DIVISIONS))?,
            None => ALL_DIVISIONS,
        };
        let query = take_value_arg(&mut args, "--search").unwrap_or_default();

        let fighters = self.store().fighters_by_wins()?;
        let shown = roster::filter_roster(&fighters, &query, division);
        if shown.is_empty() {
            println!("No fighters found. Try adjusting the search or division.");
            return Ok(());
        }
        for f in shown {
            print_fighter_line(f);
        }
        Ok(())
    }

    fn fighter(&mut self, args: &[String]) -> Result<()> {
        let id = parse_id(args.first())?;
        let f = self
            .store()
            .fighter(id)?
            .ok_or_else(|| anyhow!("fighter {id} not found"))?;

        println!("{}", f.name.to_uppercase());
        println!("{}", f.division_label());
        println!();
        println!("Tale of the tape");
        println!("  Height    {}", f.height.as_deref().unwrap_or("N/A"));
        println!("  Weight    {}", f.weight.as_deref().unwrap_or("N/A"));
        println!("  Team/Gym  {}", f.gym.as_deref().unwrap_or("N/A"));
        println!();
        println!(
            "Record  {}-{}-{}  ({} KO)",
            f.record.wins, f.record.losses, f.record.draws, f.record.kos
        );
        println!("Rating  {}", rating(&f.record));
        println!();
        for (label, value) in f.stats.as_pairs() {
            println!("  {label:<10} {value:>3} {}", "#".repeat((value / 5).max(0) as usize));
        }
        println!();
        match &f.owner_id {
            None => println!("On the market for ${}", f.value),
            Some(_) => println!("Signed to a gym"),
        }
        Ok(())
    }

    fn search(&mut self, args: &[String]) -> Result<()> {
        let query = args.join(" ");
        let found = roster::quick_search(self.store(), &query)?;
        if found.is_empty() {
            println!("No matches (queries need at least {} characters).", roster::QUICK_SEARCH_MIN_CHARS);
        }
        for f in &found {
            print_fighter_line(f);
        }
        Ok(())
    }

    fn arena(&mut self, args: &[String]) -> Result<()> {
        let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
            return Err(anyhow!("usage: strikebase arena <fighter> <fighter>"));
        };
        let blue = self.pick_fighter(a)?;
        let red = self.pick_fighter(b)?;

        let result = simulate_bout(&blue, &red, &mut rand::thread_rng());
        println!("BLUE CORNER  {} (rating {})", blue.name, result.rating_blue);
        println!("RED CORNER   {} (rating {})", red.name, result.rating_red);
        println!("Blue win chance: {:.1}%", result.p_blue * 100.0);
        println!();
        for line in &result.log {
            println!("> {line}");
        }
        Ok(())
    }

    fn pick_fighter(&mut self, raw: &str) -> Result<Fighter> {
        if let Ok(id) = raw.trim().parse::<i64>() {
            return self
                .store()
                .fighter(id)?
                .ok_or_else(|| anyhow!("fighter {id} not found"));
        }
        roster::quick_search(self.store(), raw)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no fighter matching {raw:?}"))
    }

    fn market(&mut self) -> Result<()> {
        let listings = market::listings(self.store())?;
        if let Ok(user) = self.current_user() {
            if let Some(profile) = self.store().profile(&user.id)? {
                println!("Your cash: ${}", profile.cash);
                println!();
            }
        }
        if listings.is_empty() {
            println!("No fighters available on the market.");
            return Ok(());
        }
        for f in &listings {
            println!(
                "#{:<5} {:<32} ${:<7} W:{} L:{} KO:{}",
                f.id, f.name, f.value, f.record.wins, f.record.losses, f.record.kos
            );
        }
        Ok(())
    }

    fn buy(&mut self, args: &[String]) -> Result<()> {
        let id = parse_id(args.first())?;
        let user = self.current_user()?;
        match market::purchase(self.store(), &user.id, id) {
            Ok(purchase) => {
                println!(
                    "Bought {} for ${}. Cash left: ${}",
                    purchase.fighter.name, purchase.price, purchase.cash_left
                );
                Ok(())
            }
            Err(MarketError::Backend(err)) => Err(err.context("purchase failed; refresh and retry")),
            Err(err) => Err(anyhow!(err)),
        }
    }

    fn signup(&mut self, args: &[String]) -> Result<()> {
        let (email, password) = credentials(args)?;
        let session = self.store().sign_up(email, password)?;
        self.remember(&session)?;
        println!("Account created for {}. Next: strikebase setup <manager> <gym>", session.user.email);
        Ok(())
    }

    fn login(&mut self, args: &[String]) -> Result<()> {
        let (email, password) = credentials(args)?;
        let session = self.store().sign_in(email, password)?;
        self.remember(&session)?;
        let needs_setup = self.store().profile(&session.user.id)?.is_none();
        println!("Signed in as {}", session.user.email);
        if needs_setup {
            println!("No manager profile yet. Next: strikebase setup <manager> <gym>");
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        let Some(path) = self.session_path.clone() else {
            return Ok(());
        };
        if let Some(session) = auth::load_session(&path) {
            self.store()
                .sign_out(&session.access_token)
                .context("sign out")?;
        }
        auth::clear_session(&path)?;
        println!("Signed out.");
        Ok(())
    }

    fn setup(&mut self, args: &[String]) -> Result<()> {
        let (Some(manager), Some(gym)) = (args.first(), args.get(1)) else {
            return Err(anyhow!("usage: strikebase setup <manager-name> <gym-name>"));
        };
        let user = self.current_user()?;
        let profile = profiles::setup_profile(self.store(), &user, manager, gym)?;
        println!(
            "Contract signed: {} runs {} with ${}",
            profile.manager_name.as_deref().unwrap_or_default(),
            profile.gym_name.as_deref().unwrap_or_default(),
            profile.cash
        );
        Ok(())
    }

    fn settings(&mut self, args: &[String]) -> Result<()> {
        let mut args = args.to_vec();
        let user = self.current_user()?;
        let current = self
            .store()
            .profile(&user.id)?
            .ok_or_else(|| anyhow!("no manager profile; run `strikebase setup` first"))?;
        let manager = take_value_arg(&mut args, "--manager")
            .or(current.manager_name)
            .unwrap_or_default();
        let gym = take_value_arg(&mut args, "--gym")
            .or(current.gym_name)
            .unwrap_or_default();
        let profile = profiles::update_settings(self.store(), &user, &manager, &gym)?;
        println!(
            "Settings saved: {} / {}",
            profile.manager_name.as_deref().unwrap_or_default(),
            profile.gym_name.as_deref().unwrap_or_default()
        );
        Ok(())
    }

    fn dashboard(&mut self) -> Result<()> {
        let user = self.current_user()?;
        match profiles::dashboard(self.store(), &user)? {
            Dashboard::NeedsSetup => {
                println!("No manager profile yet. Run: strikebase setup <manager> <gym>");
            }
            Dashboard::Ready { profile, fighters } => {
                println!("Manager  {}", profile.manager_name.as_deref().unwrap_or("-"));
                println!("Gym      {}", profile.gym_name.as_deref().unwrap_or("-"));
                println!("Cash     ${}", profile.cash);
                println!();
                if fighters.is_empty() {
                    println!("No fighters signed yet. Visit the market.");
                }
                for f in &fighters {
                    print_fighter_line(f);
                }
            }
        }
        Ok(())
    }
}

fn print_fighter_line(f: &Fighter) {
    println!(
        "#{:<5} {:<32} {:<18} {}-{}-{} ({} KO)",
        f.id,
        f.name,
        f.division_label(),
        f.record.wins,
        f.record.losses,
        f.record.draws,
        f.record.kos
    );
}

fn parse_id(raw: Option<&String>) -> Result<i64> {
    let raw = raw.ok_or_else(|| anyhow!("missing fighter id"))?;
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("invalid fighter id {raw:?}"))
}

fn credentials(args: &[String]) -> Result<(&str, &str)> {
    match (args.first(), args.get(1)) {
        (Some(email), Some(password)) => Ok((email.as_str(), password.as_str())),
        _ => Err(anyhow!("expected <email> <password>")),
    }
}

// Removes `name VALUE` or `name=VALUE` from `args`.
fn take_value_arg(args: &mut Vec<String>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    let idx = args
        .iter()
        .position(|a| a == name || a.starts_with(&prefix))?;
    let arg = args.remove(idx);
    if let Some(value) = arg.strip_prefix(&prefix) {
        return Some(value.trim().to_string());
    }
    if idx < args.len() {
        return Some(args.remove(idx).trim().to_string());
    }
    None
}
