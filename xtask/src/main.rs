use std::process;

use anyhow::Result;
use clap::{ArgMatches, Command};

const BIN_NAME: &str = "restruct";
const SUBCOMMANDS: [&str; 7] = [
    "collapse",
    "rename-files",
    "rename-folders",
    "delete-files",
    "delete-if",
    "preview",
    "reveal",
];

fn main() -> Result<()> {
    let args = clap::command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("install").about("Install restruct binary locally"))
        .subcommand(
            Command::new("run")
                .about("Build and run restruct with arguments")
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .arg(clap::Arg::new("args")
                    .help("Arguments to pass to restruct")
                    .action(clap::ArgAction::Append)
                    .num_args(0..))
        )
        .subcommand(
            Command::new("test")
                .about("Test Operations")
                .subcommand(Command::new("all").about("Run all tests for the entire project"))
                .subcommand(Command::new("core").about("Run tests for restruct-core"))
                .subcommand(Command::new("bin").about("Run tests for restruct-bin"))
                .subcommand(Command::new("integration").about("Run tree scenarios and CLI smoke checks"))
        )
        .get_matches();

    match args.subcommand() {
        Some(("install", args)) => handle_install_command(args),
        Some(("run", args)) => handle_run_command(args),
        Some(("test", args)) => handle_test_commands(args),
        Some((command, _)) => anyhow::bail!("Unexpected command: {command}"),
        None => anyhow::bail!("Expected subcommand"),
    }
}

fn handle_install_command(_args: &ArgMatches) -> Result<()> {
    println!("Installing {BIN_NAME}...");
    cargo(&["install", "--path", "crates/restruct-bin"], "Failed to install restruct")?;
    println!("✓ {BIN_NAME} installed successfully");
    Ok(())
}

fn handle_run_command(args: &ArgMatches) -> Result<()> {
    println!("Building and running {BIN_NAME}...");

    let run_args: Vec<String> = args.get_many::<String>("args")
        .map_or(Vec::new(), |vals| vals.cloned().collect());

    let mut command = process::Command::new("cargo");
    command.args(["run", "--bin", BIN_NAME, "--"]).args(&run_args);

    if !command.status()?.success() {
        anyhow::bail!("Failed to run {BIN_NAME}");
    }
    Ok(())
}

fn handle_test_commands(args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("all", _args)) => test_all(),
        Some(("core", _args)) => test_core(),
        Some(("bin", _args)) => test_bin(),
        Some(("integration", _args)) => test_integration(),
        _ => {
            println!("Available test commands:");
            println!("  all          - Run all tests for the entire project");
            println!("  core         - Run tests for restruct-core");
            println!("  bin          - Run tests for restruct-bin");
            println!("  integration  - Run tree scenarios and CLI smoke checks");
            Ok(())
        }
    }
}

fn test_all() -> Result<()> {
    println!("🧪 Running all tests for the restruct project...\n");

    let suites: [(&str, fn() -> Result<()>); 4] = [
        ("restruct-core", test_core),
        ("restruct-bin", test_bin),
        ("documentation", test_docs),
        ("integration", test_integration),
    ];

    let mut failed = Vec::new();
    for (name, suite) in suites {
        match suite() {
            Ok(()) => println!("✅ {name} tests passed\n"),
            Err(err) => {
                println!("❌ {name} tests failed: {err}\n");
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        println!("🎉 All tests passed successfully!");
        Ok(())
    } else {
        anyhow::bail!("Test suite failed: {}", failed.join(", "))
    }
}

fn test_core() -> Result<()> {
    println!("📚 Running restruct-core tests...");
    cargo(&["test", "--package", "restruct-core"], "Core tests failed")
}

fn test_bin() -> Result<()> {
    println!("🔧 Running restruct-bin tests...");
    cargo(&["test", "--package", "restruct-bin"], "Binary tests failed")
}

fn test_docs() -> Result<()> {
    println!("📖 Running documentation tests...");
    cargo(&["test", "--doc", "--package", "restruct-core"], "Documentation tests failed")
}

fn test_integration() -> Result<()> {
    println!("🔗 Running integration tests...");
    cargo(
        &["test", "--package", "restruct-core", "--test", "restructure"],
        "Tree scenario tests failed",
    )?;

    cargo(&["build", "--bin", BIN_NAME], "Failed to build restruct binary")?;
    cargo(&["run", "--bin", BIN_NAME, "--", "--version"], "CLI version command failed")?;
    for subcommand in SUBCOMMANDS {
        cargo(
            &["run", "--bin", BIN_NAME, "--", subcommand, "--help"],
            &format!("CLI {subcommand} help command failed"),
        )?;
    }
    Ok(())
}

fn cargo(args: &[&str], failure: &str) -> Result<()> {
    let status = process::Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{failure}");
    }
    Ok(())
}
