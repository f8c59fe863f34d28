use std::process::ExitCode;

use strikebase::config::{self, CheckLevel};

fn main() -> ExitCode {
    config::load_dotenv();

    println!("Checking datastore environment variables...");
    println!();

    let report = config::check_env();
    for check in &report.checks {
        let mark = match check.level {
            CheckLevel::Ok => "ok",
            CheckLevel::Warning => "warn",
            CheckLevel::Missing => "missing",
        };
        println!("[{mark:>7}] {}: {}", check.name, check.detail);
    }
    println!();

    if report.has_errors() {
        eprintln!("Environment variables are missing or invalid.");
        println!();
        println!("To fix this for a deployment:");
        println!("  1. Open the deployment's environment settings");
        println!("  2. Add SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY");
        println!("     (or NEXT_PUBLIC_SUPABASE_URL / NEXT_PUBLIC_SUPABASE_ANON_KEY)");
        println!("  3. Redeploy");
        println!();
        println!("To fix this for local development:");
        println!("  1. Create .env.local next to Cargo.toml");
        println!("  2. Fill in the project URL and key");
        println!("  3. Or set STRIKEBASE_BACKEND=sqlite to use the embedded store");
        return ExitCode::FAILURE;
    }

    println!("All environment variables are configured.");
    ExitCode::SUCCESS
}
