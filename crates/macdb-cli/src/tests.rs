use super::*;

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["macdb-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["macdb-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn import_defaults_to_no_limit_and_not_all() {
    let cli = Cli::try_parse_from(["macdb-cli", "import"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            limit: None,
            all: false
        })
    ));
}

#[test]
fn import_with_limit() {
    let cli = Cli::try_parse_from(["macdb-cli", "import", "--limit", "25"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            limit: Some(25),
            all: false
        })
    ));
}

#[test]
fn import_all_conflicts_with_limit() {
    let result = Cli::try_parse_from(["macdb-cli", "import", "--all", "--limit", "5"]);
    assert!(result.is_err());
}

#[test]
fn sync_new_apps_takes_a_limit() {
    let cli = Cli::try_parse_from(["macdb-cli", "sync-new-apps", "--limit", "10"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::SyncNewApps { limit: Some(10) })
    ));
}

#[test]
fn categories_preview_requires_a_source_url() {
    assert!(Cli::try_parse_from(["macdb-cli", "categories", "preview"]).is_err());

    let cli = Cli::try_parse_from([
        "macdb-cli",
        "categories",
        "preview",
        "--source-url",
        "https://www.macupdate.com/app/mac/5/rectangle",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            command: CategoryCommands::Preview { ref source_url, json: false }
        }) if source_url.ends_with("/rectangle")
    ));
}

#[test]
fn owner_role_defaults_to_system() {
    let cli = Cli::try_parse_from(["macdb-cli", "owner", "ensure", "--email", "ops@example.com"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Owner {
            command: OwnerCommands::Ensure {
                role: OwnerRole::System,
                ..
            }
        })
    ));
}

#[test]
fn job_status_parses_a_uuid() {
    let id = "7f1c4c1e-3b7e-4a61-9d0c-2f0f2d5f9a10";
    let cli = Cli::try_parse_from(["macdb-cli", "jobs", "status", id]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Jobs {
            command: JobCommands::Status { id: parsed }
        }) if parsed.to_string() == id
    ));

    assert!(Cli::try_parse_from(["macdb-cli", "jobs", "status", "not-a-uuid"]).is_err());
}
