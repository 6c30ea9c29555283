use super::create::SettingsArgs;
use super::{open_in_editor, Context};
use crate::output::{print_json, print_table};
use anyhow::Context as _;
use clap::Subcommand;
use mkcd_core::config::{validate_profile_name, Config};
use mkcd_core::report::Reporter;
use mkcd_core::settings::{merge, IgnoreFlavor, LicenseFlavor, Settings};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// List all profiles
    List,

    /// Show one profile (default: the default profile)
    Show { name: Option<String> },

    /// Create a profile from flags, or interactively with --interactive
    Create {
        name: String,

        /// Make this the default profile
        #[arg(long = "default")]
        make_default: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Open the config file to edit a profile, then re-validate
    Edit { name: String },

    /// Delete a profile
    Delete { name: String },

    /// Copy a profile under a new name
    Copy { source: String, destination: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context, subcmd: ProfileSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ProfileSubcommand::List => list(ctx),
        ProfileSubcommand::Show { name } => show(ctx, name.as_deref()),
        ProfileSubcommand::Create {
            name,
            make_default,
            settings,
        } => create(ctx, &name, make_default, &settings),
        ProfileSubcommand::Edit { name } => edit(ctx, &name),
        ProfileSubcommand::Delete { name } => delete(ctx, &name),
        ProfileSubcommand::Copy {
            source,
            destination,
        } => copy(ctx, &source, &destination),
    }
}

fn yes_no(v: Option<bool>) -> &'static str {
    if v == Some(true) {
        "yes"
    } else {
        "no"
    }
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

fn list(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let default = &config.core.default_profile;

    if ctx.json {
        let profiles: Vec<_> = config
            .profiles
            .iter()
            .map(|(name, settings)| {
                serde_json::json!({
                    "name": name,
                    "default": name == default,
                    "description": settings.describe(),
                    "settings": settings,
                })
            })
            .collect();
        return print_json(&profiles);
    }

    if config.profiles.is_empty() {
        println!("No profiles. Create one with: mkcd profile create <name>");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = config
        .profiles
        .iter()
        .map(|(name, s)| {
            let label = if name == default {
                format!("{name} (default)")
            } else {
                name.clone()
            };
            vec![
                label,
                yes_no(s.git).to_string(),
                yes_no(s.editor).to_string(),
                s.template.clone().unwrap_or_else(|| "-".to_string()),
                s.describe(),
            ]
        })
        .collect();
    print_table(&["NAME", "GIT", "EDITOR", "TEMPLATE", "DESCRIPTION"], rows);
    Ok(())
}

fn show(ctx: &Context, name: Option<&str>) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let settings = config.get_profile(name)?;
    let name = name.unwrap_or(&config.core.default_profile);

    if ctx.json {
        let value = serde_json::json!({
            "name": name,
            "default": name == config.core.default_profile,
            "settings": settings,
        });
        return print_json(&value);
    }

    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("Profile:     {name}");
    println!("Default:     {}", yes_no(Some(name == config.core.default_profile)));
    println!("Git:         {}", yes_no(settings.git));
    println!("Remote:      {}", opt(&settings.git_remote));
    println!("Editor:      {}", yes_no(settings.editor));
    println!("Editor name: {}", opt(&settings.editor_name));
    println!("README:      {}", yes_no(settings.readme));
    println!("Template:    {}", opt(&settings.template));
    println!(
        "Gitignore:   {}",
        settings.gitignore.map(|g| g.to_string()).unwrap_or_else(|| "-".into())
    );
    println!(
        "License:     {}",
        settings.license.map(|l| l.to_string()).unwrap_or_else(|| "-".into())
    );
    println!(
        "Touch:       {}",
        settings
            .touch
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.join(", "))
            .unwrap_or_else(|| "-".into())
    );
    println!("Mode:        {}", opt(&settings.mode));
    println!("Parent mode: {}", opt(&settings.parent_mode));
    println!("Expire:      {}", opt(&settings.expire));
    Ok(())
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

fn create(ctx: &Context, name: &str, make_default: bool, args: &SettingsArgs) -> anyhow::Result<()> {
    validate_profile_name(name)?;
    let mut config = ctx.load_config()?;
    let reporter = ctx.reporter(&config);

    if config.has_profile(name) && !ctx.force {
        anyhow::bail!("profile '{name}' already exists (use --force to overwrite)");
    }

    let mut settings = args.to_settings();
    let mut make_default = make_default;
    if settings.is_empty() && ctx.interactive {
        settings = prompt_settings(&reporter)?;
        make_default = make_default || reporter.confirm("Make this the default profile?", false)?;
    }

    // Catch malformed values now rather than at the next create.
    merge(&settings, &Settings::default())
        .check()
        .with_context(|| format!("profile '{name}' is not usable"))?;

    if ctx.dry_run {
        reporter.info(&format!(
            "[dry-run] would save profile '{name}': {}",
            settings.describe()
        ));
        return Ok(());
    }

    config.set_profile(name, settings)?;
    if make_default {
        config.set_default_profile(name)?;
    }
    ctx.save_config(&config)?;
    reporter.success(&format!("Saved profile '{name}'"));
    Ok(())
}

fn prompt_settings(reporter: &dyn Reporter) -> anyhow::Result<Settings> {
    let on = |v: bool| v.then_some(true);
    let text = |v: String| {
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    };

    let git = reporter.confirm("Initialize a git repository?", false)?;
    let editor = reporter.confirm("Open an editor?", false)?;
    let readme = reporter.confirm("Generate README.md?", false)?;
    let template = text(reporter.input("Template (empty for none)", "")?);

    let mut flavors = vec!["none".to_string()];
    flavors.extend(IgnoreFlavor::all().iter().map(|f| f.to_string()));
    let gitignore = match reporter.select(".gitignore flavor", &flavors)? {
        0 => None,
        i => Some(IgnoreFlavor::all()[i - 1]),
    };

    let mut licenses = vec!["none".to_string()];
    licenses.extend(LicenseFlavor::all().iter().map(|l| l.to_string()));
    let license = match reporter.select("License", &licenses)? {
        0 => None,
        i => Some(LicenseFlavor::all()[i - 1]),
    };

    let touch: Vec<String> = reporter
        .input("Files to create (comma-separated)", "")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(Settings {
        git: on(git),
        editor: on(editor),
        readme: on(readme),
        template,
        gitignore,
        license,
        touch: (!touch.is_empty()).then_some(touch),
        ..Settings::default()
    })
}

// ---------------------------------------------------------------------------
// edit
// ---------------------------------------------------------------------------

fn edit(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    config.get_profile(Some(name))?;
    if !ctx.config_path.exists() {
        ctx.save_config(&config)?;
    }
    let reporter = ctx.reporter(&config);
    reporter.info(&format!("Edit the [profiles.{name}] section"));
    open_in_editor(&ctx.config_path)?;

    let config = ctx
        .load_config()
        .context("config is invalid after editing; run `mkcd profile edit` again to fix it")?;
    match config.get_profile(Some(name)) {
        Ok(_) => reporter.success(&format!("Profile '{name}' is valid")),
        Err(_) => reporter.warning(&format!("Profile '{name}' no longer exists")),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// delete / copy
// ---------------------------------------------------------------------------

fn delete(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let mut config = ctx.load_config()?;
    let reporter = ctx.reporter(&config);
    config.get_profile(Some(name))?;

    let confirmed =
        ctx.force || reporter.confirm(&format!("Delete profile '{name}'?"), false)?;
    if !confirmed {
        reporter.warning("Delete cancelled (use --force to skip the prompt)");
        return Ok(());
    }

    config.delete_profile(name)?;
    if ctx.dry_run {
        reporter.info(&format!("[dry-run] would delete profile '{name}'"));
        return Ok(());
    }
    ctx.save_config(&config)?;
    reporter.success(&format!("Deleted profile '{name}'"));
    Ok(())
}

fn copy(ctx: &Context, source: &str, destination: &str) -> anyhow::Result<()> {
    let mut config: Config = ctx.load_config()?;
    let reporter = ctx.reporter(&config);
    config.copy_profile(source, destination, ctx.force)?;
    if ctx.dry_run {
        reporter.info(&format!("[dry-run] would copy profile '{source}' to '{destination}'"));
        return Ok(());
    }
    ctx.save_config(&config)?;
    reporter.success(&format!("Copied profile '{source}' to '{destination}'"));
    Ok(())
}
