mod cli;
mod logging;
mod prompts;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;

use pmfs_core::ai::gates;
use pmfs_core::config::config_path;
use pmfs_core::{
    export, store, AiClient, Analyst, Config, Deduplicator, ExtractionOracle, ImportMode,
    ModelOracle, Project, ProjectData, PromptCatalog, Requirement, Store,
};

use crate::cli::{
    AspectsCommand, Cli, Command, ProductCommand, ProjectCommand, ProjectRef, ReqCommand,
};

/// Everything a command needs, built once from the config.
struct App {
    store: Store,
    config: Config,
    client: AiClient,
    oracle: ModelOracle<AiClient>,
    catalog: PromptCatalog,
}

impl App {
    fn new(config: Config) -> Self {
        let client = AiClient::from_config(&config.ai);
        Self {
            store: Store::new(&config.base_dir),
            oracle: ModelOracle::new(client.clone()),
            client,
            catalog: PromptCatalog::default(),
            config,
        }
    }

    /// The model judges duplicates when the config asks for it and a model
    /// is configured; otherwise text comparison.
    fn deduplicator(&self) -> Deduplicator<'_> {
        if self.config.dedup.use_oracle && self.client.is_available() {
            Deduplicator::with_oracle(&self.oracle)
        } else {
            Deduplicator::heuristic()
        }
    }

    fn extractor(&self) -> Result<&dyn ExtractionOracle> {
        self.require_ai()?;
        Ok(&self.oracle)
    }

    fn open_project(&self, target: ProjectRef) -> Result<Project> {
        let mut project = Project::handle(target.product, target.project);
        self.store.load_project(&mut project).with_context(|| {
            format!(
                "Failed to load project {} of product {}",
                target.project, target.product
            )
        })?;
        Ok(project)
    }

    /// Bails with a pointer to the config file when no model is configured.
    fn require_ai(&self) -> Result<&AiClient> {
        if !self.client.is_available() {
            let location = config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string());
            bail!("No AI program configured; set ai.program in {}", location);
        }
        Ok(&self.client)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet)?;

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(root) = &cli.root {
        config.base_dir = root.clone();
    }
    let app = App::new(config);

    match cli.command {
        Command::Init => {
            app.store.ensure_layout().context("Failed to create store layout")?;
            println!(
                "{} {}",
                "Initialized store at".green(),
                app.store.layout().root().display()
            );
        }
        Command::Product(cmd) => handle_product_command(&app, cmd)?,
        Command::Project(cmd) => handle_project_command(&app, cmd)?,
        Command::Req(cmd) => handle_req_command(&app, cmd)?,
        Command::Import {
            target,
            file,
            mode,
            yes,
        } => import_batch(&app, target, &file, mode, yes)?,
        Command::Export { target, output } => {
            let project = app.open_project(target)?;
            export::export_project(&project, &output)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            println!("{} {}", "Exported to".green(), output.display());
        }
        Command::Analyze {
            target,
            role,
            question,
            gates,
        } => {
            let client = app.require_ai()?;
            let mut project = app.open_project(target)?;
            let analyst = Analyst::new(client, &app.catalog);
            let analyzed = app
                .store
                .analyze_all(&mut project, &analyst, &role, &question, &gates)
                .context("Analysis did not complete")?;
            println!("{} {} requirement(s)", "Analyzed".green(), analyzed);
        }
        Command::Prompts => list_prompts(&app),
        Command::Suggest { target, id } => {
            let client = app.require_ai()?;
            let mut project = app.open_project(target)?;
            if project.requirement(id).is_none() {
                println!("{}", format!("Requirement {} not found.", id).yellow());
                return Ok(());
            }
            let added = app
                .store
                .suggest_others(&mut project, id, client, &app.deduplicator())?;
            if added.is_empty() {
                println!("{}", "No new suggestions.".yellow());
            }
            for req in &added {
                println!("{} {} - {}", "Proposed".green(), req.id, req.name);
            }
        }
        Command::Aspects(cmd) => handle_aspects_command(&app, cmd)?,
        Command::Ingest {
            target,
            dir,
            extract,
        } => {
            let mut project = app.open_project(target)?;
            let dir = dir.unwrap_or_else(|| {
                app.store
                    .layout()
                    .input_dir(project.product_id, project.id)
            });
            let extractor = if extract {
                Some(app.extractor()?)
            } else {
                None
            };
            let before = project.data.requirements.len();
            let ingested = app
                .store
                .ingest_input_dir(&mut project, &dir, extractor, &app.deduplicator())
                .with_context(|| format!("Failed to ingest {}", dir.display()))?;
            if ingested.is_empty() {
                println!("{}", format!("Nothing to ingest in {}", dir.display()).yellow());
            }
            for attachment in &ingested {
                println!(
                    "{} {} ({}) as attachment {}",
                    "Ingested".green(),
                    attachment.filename,
                    attachment.mimetype,
                    attachment.id
                );
            }
            let extracted = project.data.requirements.len() - before;
            if extracted > 0 {
                println!("{} {} proposed requirement(s)", "Extracted".green(), extracted);
            }
        }
        Command::Analyse {
            target,
            attachment,
            role,
            question,
        } => {
            let client = app.require_ai()?;
            let project = app.open_project(target)?;
            let analyst = Analyst::new(client, &app.catalog);
            let answer = app.store.analyse_attachment(
                &project,
                attachment,
                &analyst,
                Some(app.extractor()?),
                &role,
                &question,
            )?;
            let verdict = if answer.passed {
                "Yes".green()
            } else {
                "No".red()
            };
            println!("{}: {}", "Answer".blue(), verdict);
            if !answer.follow_up.is_empty() {
                println!("{}: {}", "Follow-up".blue(), answer.follow_up.trim());
            }
        }
        Command::Intel { target, attachment } => {
            let client = app.require_ai()?;
            let mut project = app.open_project(target)?;
            let intel = app
                .store
                .extract_intelligence(&mut project, attachment, client)?;
            println!("{}: {}", "Intelligence".blue(), intel.id);
            println!("{}: {}", "Summary".blue(), intel.description);
            for aspect in &intel.design_aspects {
                println!("  - {}: {}", aspect.name, aspect.description);
            }
        }
    }

    Ok(())
}

fn handle_product_command(app: &App, cmd: ProductCommand) -> Result<()> {
    let mut db = app.store.load_database().context("Failed to load product index")?;
    match cmd {
        ProductCommand::Add { name } => {
            let id = app.store.new_product(&mut db, &name)?;
            println!("{}", "Product added successfully!".green());
            println!("ID: {}", id);
        }
        ProductCommand::List => {
            if db.products.is_empty() {
                println!("{}", "No products found.".yellow());
                return Ok(());
            }
            println!("{:<6} | {:<40} | {:<8}", "ID", "Name", "Projects");
            println!("{}", "-".repeat(60));
            for product in &db.products {
                println!(
                    "{:<6} | {:<40} | {:<8}",
                    product.id,
                    product.name,
                    product.projects.len()
                );
            }
        }
        ProductCommand::Rename { id, name } => {
            app.store.modify_product(&mut db, id, &name)?;
            println!("{}", "Product renamed.".green());
        }
    }
    Ok(())
}

fn handle_project_command(app: &App, cmd: ProjectCommand) -> Result<()> {
    let mut db = app.store.load_database().context("Failed to load product index")?;
    match cmd {
        ProjectCommand::Add {
            product,
            name,
            scope,
        } => {
            let data = ProjectData {
                scope: scope.unwrap_or_default(),
                ..Default::default()
            };
            let owner = store::product_mut(&mut db, product)?;
            let id = app.store.new_project(owner, &name, data)?;
            app.store.save(&db)?;
            println!("{}", "Project added successfully!".green());
            println!("ID: {}", id);
        }
        ProjectCommand::List { product } => {
            let product = store::product(&db, product)?;
            if product.projects.is_empty() {
                println!("{}", "No projects found.".yellow());
                return Ok(());
            }
            println!("{:<6} | {:<40}", "ID", "Name");
            println!("{}", "-".repeat(50));
            for project in &product.projects {
                println!("{:<6} | {:<40}", project.id, project.name);
            }
        }
        ProjectCommand::Show { target } => {
            let project = app.open_project(target)?;
            show_project(&project);
        }
        ProjectCommand::Delete { target, yes } => {
            let project = store::project_mut(&mut db, target.product, target.project)?;
            println!(
                "{} {} - {}",
                "Deleting project".yellow(),
                project.id,
                project.name
            );
            if !prompts::confirm("Delete this project and all its files?", yes)? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            app.store
                .delete_project(&mut db, target.product, target.project)?;
            println!("{}", "Project deleted.".green());
        }
    }
    Ok(())
}

fn handle_req_command(app: &App, cmd: ReqCommand) -> Result<()> {
    match cmd {
        ReqCommand::Add {
            target,
            name,
            description,
            category,
            tags,
            proposed,
            interactive,
        } => {
            let mut project = app.open_project(target)?;
            let req = if interactive || (name.is_none() && description.is_none()) {
                prompts::prompt_new_requirement(&project)?
            } else {
                let mut req =
                    Requirement::new(name.unwrap_or_default(), description.unwrap_or_default());
                req.category = category.unwrap_or_default();
                req.tags = tags.as_deref().map(prompts::split_tags).unwrap_or_default();
                req.condition.proposed = proposed;
                req.condition.active = !proposed;
                req
            };
            let id = app.store.add_requirement(&mut project, req)?;
            println!("{}", "Requirement added successfully!".green());
            println!("ID: {}", id);
        }
        ReqCommand::List {
            target,
            all,
            proposed,
        } => {
            let project = app.open_project(target)?;
            list_requirements(&project, all, proposed);
        }
        ReqCommand::Show { target, id } => {
            let project = app.open_project(target)?;
            match project.requirement(id) {
                Some(req) => show_requirement(req),
                None => println!("{}", format!("Requirement {} not found.", id).yellow()),
            }
        }
        ReqCommand::Activate { target, id } => {
            let mut project = app.open_project(target)?;
            if project.requirement(id).is_none() {
                println!("{}", format!("Requirement {} not found.", id).yellow());
                return Ok(());
            }
            app.store.activate(&mut project, id)?;
            println!("{} {}", "Activated".green(), id);
        }
        ReqCommand::ActivateAll { target } => {
            let mut project = app.open_project(target)?;
            let count = app
                .store
                .activate_where(&mut project, |r| r.condition.proposed && !r.condition.deleted)?;
            println!("{} {} requirement(s)", "Activated".green(), count);
        }
        ReqCommand::Delete { target, id } => {
            let mut project = app.open_project(target)?;
            if project.requirement(id).is_none() {
                println!("{}", format!("Requirement {} not found.", id).yellow());
                return Ok(());
            }
            app.store.delete_requirement(&mut project, id)?;
            println!("{} {}", "Deleted".green(), id);
        }
        ReqCommand::Restore { target, id } => {
            let mut project = app.open_project(target)?;
            if project.requirement(id).is_none() {
                println!("{}", format!("Requirement {} not found.", id).yellow());
                return Ok(());
            }
            app.store.restore_requirement(&mut project, id)?;
            println!("{} {}", "Restored".green(), id);
        }
        ReqCommand::Dedupe {
            target,
            ignore_proposed,
            yes,
        } => {
            let mut project = app.open_project(target)?;
            let deleted = project
                .data
                .requirements
                .iter()
                .filter(|r| r.condition.deleted)
                .count();
            if deleted > 0 {
                println!(
                    "{}",
                    format!("{} deleted requirement(s) will be removed for good.", deleted)
                        .yellow()
                );
            }
            if !prompts::confirm("Deduplicate this project?", yes)? {
                println!("{}", "Cancelled".yellow());
                return Ok(());
            }
            let removed = app
                .store
                .dedupe(&mut project, &app.deduplicator(), ignore_proposed)?;
            println!("{} {} requirement(s)", "Removed".green(), removed);
        }
    }
    Ok(())
}

fn handle_aspects_command(app: &App, cmd: AspectsCommand) -> Result<()> {
    let client = app.require_ai()?;
    match cmd {
        AspectsCommand::Generate { target } => {
            let mut project = app.open_project(target)?;
            let count = app.store.generate_design_aspects_all(&mut project, client)?;
            println!("{} {} design aspect(s)", "Generated".green(), count);
        }
        AspectsCommand::Templates {
            target,
            role,
            question,
        } => {
            let mut project = app.open_project(target)?;
            let added = app.store.generate_requirements_from_aspects(
                &mut project,
                client,
                &app.catalog,
                &role,
                &question,
                &app.deduplicator(),
            )?;
            println!("{} {} proposed requirement(s)", "Added".green(), added);
        }
    }
    Ok(())
}

fn import_batch(
    app: &App,
    target: ProjectRef,
    file: &Path,
    mode: ImportMode,
    yes: bool,
) -> Result<()> {
    let mut project = app.open_project(target)?;
    let batch = export::load_batch(file)
        .with_context(|| format!("Failed to read batch {}", file.display()))?;

    if mode == ImportMode::Replace && !project.data.requirements.is_empty() {
        println!(
            "{}",
            format!(
                "Replace discards the {} existing requirement(s).",
                project.data.requirements.len()
            )
            .yellow()
        );
        if !prompts::confirm("Continue with import?", yes)? {
            println!("{}", "Import cancelled.".yellow());
            return Ok(());
        }
    }

    let report = app
        .store
        .import(&mut project, batch, mode, &app.deduplicator())?;
    println!("{} ({})", "Import complete".green(), mode);
    println!("  updated:      {}", report.updated);
    println!("  added:        {}", report.added);
    println!("  proposed:     {}", report.promoted);
    println!("  intelligence: {}", report.intelligence);
    Ok(())
}

fn list_prompts(app: &App) {
    println!("{}", "Roles".green());
    for role in app.catalog.roles() {
        println!("  {}", role.blue());
        if let Ok(questions) = app.catalog.get(role) {
            for prompt in questions {
                println!("    {:<4} {}", prompt.id, prompt.question);
            }
        }
    }
    println!("\n{}", "Gates".green());
    for gate in gates::all() {
        println!("  {:<22} {}", gate.id.blue(), gate.question);
    }
    println!("\nAI: {}", app.client.mode_description());
}

fn show_project(project: &Project) {
    let data = &project.data;
    let live = data.requirements.iter().filter(|r| !r.condition.deleted);
    let proposed = live.clone().filter(|r| r.condition.proposed).count();

    println!("{}: {}", "ID".blue(), project.id);
    println!("{}: {}", "Product".blue(), project.product_id);
    println!("{}: {}", "Name".blue(), project.name);
    if !data.scope.is_empty() {
        println!("{}: {}", "Scope".blue(), data.scope);
    }
    if !data.status.is_empty() {
        println!("{}: {}", "Status".blue(), data.status);
    }
    if !data.priority.is_empty() {
        println!("{}: {}", "Priority".blue(), data.priority);
    }
    if let Some(start) = data.start_date {
        println!("{}: {}", "Start".blue(), start.format("%Y-%m-%d"));
    }
    if let Some(end) = data.end_date {
        println!("{}: {}", "End".blue(), end.format("%Y-%m-%d"));
    }
    println!(
        "{}: {} ({} proposed)",
        "Requirements".blue(),
        live.count(),
        proposed
    );
    println!("{}: {}", "Attachments".blue(), data.attachments.len());
    println!("{}: {}", "Intelligence".blue(), data.intelligence.len());
}

fn list_requirements(project: &Project, all: bool, proposed_only: bool) {
    let reqs: Vec<&Requirement> = project
        .data
        .requirements
        .iter()
        .filter(|r| all || !r.condition.deleted)
        .filter(|r| !proposed_only || r.condition.proposed)
        .collect();

    if reqs.is_empty() {
        println!("{}", "No requirements found.".yellow());
        return;
    }

    println!(
        "{:<6} | {:<40} | {:<10} | {:<15} | {:<6}",
        "ID", "Name", "State", "Category", "Parent"
    );
    println!("{}", "-".repeat(90));

    for req in reqs {
        let c = &req.condition;
        let state = if c.deleted {
            "deleted".red()
        } else if c.proposed {
            "proposed".yellow()
        } else if c.active {
            "active".green()
        } else {
            "inactive".normal()
        };
        let parent = if req.is_top_level() {
            "-".to_string()
        } else {
            req.parent_id.to_string()
        };
        println!(
            "{:<6} | {:<40} | {:<10} | {:<15} | {:<6}",
            req.id, req.name, state, req.category, parent
        );
    }
}

fn show_requirement(req: &Requirement) {
    let c = &req.condition;
    println!("{}: {}", "ID".blue(), req.id);
    println!("{}: {}", "Name".blue(), req.name);
    println!("{}: {}", "Description".blue(), req.description);
    if !req.owner.is_empty() {
        println!("{}: {}", "Owner".blue(), req.owner);
    }
    if !req.category.is_empty() {
        println!("{}: {}", "Category".blue(), req.category);
    }
    if !req.tags.is_empty() {
        println!("{}: {}", "Tags".blue(), req.tags.join(", "));
    }
    if !req.is_top_level() {
        println!("{}: {}", "Parent".blue(), req.parent_id);
    }
    if let Some(created) = req.created_at {
        println!("{}: {}", "Created".blue(), created.format("%Y-%m-%d %H:%M"));
    }
    println!(
        "{}: proposed={} active={} deleted={} ai_generated={} ai_analyzed={}",
        "Condition".blue(),
        c.proposed,
        c.active,
        c.deleted,
        c.ai_generated,
        c.ai_analyzed
    );

    if !req.gate_results.is_empty() {
        println!("\n{}:", "Gate results".green());
        for result in &req.gate_results {
            let verdict = if result.passed { "pass".green() } else { "fail".red() };
            println!("  [{}] {}", verdict, result.gate_id);
            if !result.follow_up.is_empty() {
                println!("        {}", result.follow_up);
            }
        }
    }

    if !req.design_aspects.is_empty() {
        println!("\n{}:", "Design aspects".green());
        for aspect in &req.design_aspects {
            let marker = if aspect.processed { " (processed)" } else { "" };
            println!("  - {}{}: {}", aspect.name, marker, aspect.description);
        }
    }

    if !req.history.is_empty() {
        println!("\n{}:", "History".green());
        for entry in &req.history {
            println!(
                "  {} {}: {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.user,
                entry.comment
            );
        }
    }
}
