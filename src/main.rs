//! tw: command-line front end for a taskweave project.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use taskweave::{Error, GraphStore, Priority, ProjectStore, Status, TaskBuilder, TaskNode, algo, ops};

mod cli;

use cli::{Cli, Command, CriterionAction};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskweave")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskweave.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_project_root(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn format_status(status: Status) -> ColoredString {
    match status {
        Status::Ready => "ready".green(),
        Status::InProgress => "in_progress".yellow(),
        Status::InReview => "in_review".magenta(),
        Status::Completed => "completed".blue(),
        Status::Blocked => "blocked".red(),
    }
}

fn short(id: &str) -> ColoredString {
    id.get(..8).unwrap_or(id).cyan()
}

fn title_of<'a>(graph: &'a GraphStore, id: &str) -> &'a str {
    graph.get_node(id).map(TaskNode::title).unwrap_or("?")
}

fn print_task_line(node: &TaskNode) {
    println!(
        "{} {} {} {}",
        format_status(node.status()),
        short(node.id()),
        node.priority().to_string().dimmed(),
        node.title()
    );
}

fn print_task(graph: &GraphStore, node: &TaskNode) {
    println!("{}: {}", "ID".bold(), node.id().cyan());
    println!("{}: {}", "Title".bold(), node.title());
    println!("{}: {}", "Status".bold(), format_status(node.status()));
    println!("{}: {}", "Priority".bold(), node.priority());
    if let Some(desc) = node.description() {
        println!("{}: {}", "Description".bold(), desc);
    }
    if !node.criteria().is_empty() {
        println!("{}:", "Criteria".bold());
        for item in node.criteria() {
            let mark = if item.completed { "✓".green() } else { "·".dimmed() };
            println!("  {} {} {}", mark, short(&item.id), item.text);
        }
    }
    if !node.deliverables().is_empty() {
        println!("{}:", "Deliverables".bold());
        for item in node.deliverables() {
            let mark = if item.completed { "✓".green() } else { "·".dimmed() };
            let path = item.file_path.as_deref().map(|p| format!(" ({p})")).unwrap_or_default();
            println!("  {} {} {}{}", mark, short(&item.id), item.text, path.dimmed());
        }
    }
    let open_fixes: Vec<_> = node.need_fixes().iter().filter(|f| !f.resolved).collect();
    if !open_fixes.is_empty() {
        println!("{}:", "Needs fixing".bold());
        for fix in open_fixes {
            println!("  {} {} {}", "!".red(), short(&fix.id), fix.text);
        }
    }
    if !node.blockers().is_empty() {
        println!("{}:", "Blocked by".bold());
        for blocker in node.blockers() {
            println!("  {} {}", short(blocker), title_of(graph, blocker));
        }
    }
    if let Some(rationale) = node.dependency_rationale() {
        println!("{}: {}", "Rationale".bold(), rationale);
    }
    if !node.related_files().is_empty() {
        println!("{}: {}", "Files".bold(), node.related_files().join(", "));
    }
    if let Some(notes) = node.notes() {
        println!("{}: {}", "Notes".bold(), notes);
    }
    println!("{}: {}", "Created".bold(), node.created_at());
    println!("{}: {}", "Updated".bold(), node.updated_at());
    if let Some(completed_at) = node.completed_at() {
        println!("{}: {}", "Completed".bold(), completed_at);
    }
}

/// Resolve a criterion id or unique prefix within one task.
fn resolve_criterion(node: &TaskNode, prefix: &str) -> taskweave::Result<String> {
    let mut matches = node.criteria().iter().filter(|c| c.id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item.id.clone()),
        _ => Err(Error::NotFound(prefix.to_string())),
    }
}

fn default_project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "untitled".to_string())
}

fn open_store(root: &Path) -> Result<ProjectStore> {
    ProjectStore::open(root).context("Failed to open project")
}

fn run(cli: Cli) -> Result<()> {
    let root = get_project_root(&cli);

    match cli.command {
        Command::Init { name } => {
            let name = name.unwrap_or_else(|| default_project_name(&root));
            ProjectStore::init(&root, &name).context("Failed to initialize project")?;
            println!("{} Initialized project '{}' in {}", "✓".green(), name, root.display());
        }

        Command::Create {
            title,
            priority,
            description,
            criteria,
            files,
        } => {
            let store = open_store(&root)?;
            let priority = Priority::parse(&priority)
                .ok_or_else(|| eyre!("unknown priority '{priority}' (expected top, second or later)"))?;
            let mut builder = TaskBuilder::new(title).priority(priority).criteria(criteria);
            if let Some(description) = description {
                builder = builder.description(description);
            }
            for file in files {
                builder = builder.related_file(file);
            }
            let node = builder.build().context("Invalid task")?;

            let (id, title) = (node.id().to_string(), node.title().to_string());
            store.update(|graph| graph.add_node(node)).context("Failed to create task")?;
            println!("{} Created: {} {}", "✓".green(), id.cyan(), title);
        }

        Command::Show { id } => {
            let store = open_store(&root)?;
            let graph = store.load()?;
            let node = graph.get_node_by_id_or_prefix(&id)?;
            print_task(&graph, node);
        }

        Command::List { status } => {
            let store = open_store(&root)?;
            let status_filter = match status.as_deref() {
                Some(s) => Some(Status::parse(s).ok_or_else(|| eyre!("unknown status '{s}'"))?),
                None => None,
            };
            let graph = store.load()?;
            let mut shown = 0;
            for node in graph.nodes().filter(|n| status_filter.is_none_or(|s| n.status() == s)) {
                print_task_line(node);
                shown += 1;
            }
            if shown == 0 {
                println!("{}", "No tasks found".dimmed());
            }
        }

        Command::Block {
            blocker,
            blocked,
            rationale,
        } => {
            let store = open_store(&root)?;
            let (blocker, blocked) = store
                .update(|graph| {
                    let blocker = graph.resolve_id(&blocker)?;
                    let blocked = graph.resolve_id(&blocked)?;
                    ops::link(graph, &blocker, &blocked, &rationale)?;
                    Ok((blocker, blocked))
                })
                .context("Failed to add dependency")?;
            println!("{} {} is now blocked by {}", "✓".green(), short(&blocked), short(&blocker));
        }

        Command::Unblock { blocker, blocked } => {
            let store = open_store(&root)?;
            let removed = store
                .update(|graph| {
                    let blocker = graph.resolve_id(&blocker)?;
                    let blocked = graph.resolve_id(&blocked)?;
                    ops::unlink(graph, &blocker, &blocked)
                })
                .context("Failed to remove dependency")?;
            if removed {
                println!("{} Dependency removed", "✓".green());
            } else {
                println!("{}", "No such dependency".dimmed());
            }
        }

        Command::Cut { id } => {
            let store = open_store(&root)?;
            let report = store
                .update(|graph| {
                    let id = graph.resolve_id(&id)?;
                    ops::cut_node(graph, &id)
                })
                .context("Failed to cut task")?;
            println!(
                "{} Cut: {} {} ({} bypass edge(s))",
                "✓".green(),
                short(report.removed.id()),
                report.removed.title(),
                report.added_edges.len()
            );
        }

        Command::Delete { id, cascade } => {
            let store = open_store(&root)?;
            let deleted = store
                .update(|graph| {
                    let id = graph.resolve_id(&id)?;
                    if cascade {
                        ops::cascade_delete(graph, &id)
                    } else {
                        graph.remove_node(&id);
                        Ok(vec![id])
                    }
                })
                .context("Failed to delete task")?;
            println!("{} Deleted {} task(s)", "✓".green(), deleted.len());
        }

        Command::Merge { source, target } => {
            let store = open_store(&root)?;
            let target = store
                .update(|graph| {
                    let source = graph.resolve_id(&source)?;
                    let target = graph.resolve_id(&target)?;
                    ops::merge_tasks(graph, &source, &target)?;
                    Ok(target)
                })
                .context("Failed to merge tasks")?;
            println!("{} Merged into {}", "✓".green(), short(&target));
        }

        Command::Insert {
            before,
            task,
            after,
            task_rationale,
            after_rationale,
        } => {
            let store = open_store(&root)?;
            store
                .update(|graph| {
                    let a = graph.resolve_id(&before)?;
                    let b = graph.resolve_id(&task)?;
                    let c = graph.resolve_id(&after)?;
                    ops::wire_insert(graph, &a, &b, &c, &task_rationale, &after_rationale)
                })
                .context("Failed to insert task")?;
            println!("{} Inserted {} between {} and {}", "✓".green(), task.cyan(), before.cyan(), after.cyan());
        }

        Command::Criterion { task, action } => {
            let store = open_store(&root)?;
            let status = store
                .update(|graph| {
                    let id = graph.resolve_id(&task)?;
                    let node = graph.get_node_mut(&id).ok_or_else(|| Error::NotFound(id.clone()))?;
                    match &action {
                        CriterionAction::Add { text } => {
                            node.add_criterion(text.as_str())?;
                        }
                        CriterionAction::Done { item } => {
                            let item = resolve_criterion(node, item)?;
                            node.set_criterion_completed(&item, true)?;
                        }
                        CriterionAction::Undo { item } => {
                            let item = resolve_criterion(node, item)?;
                            node.set_criterion_completed(&item, false)?;
                        }
                    }
                    Ok(node.status())
                })
                .context("Failed to update criterion")?;
            println!("{} Task is now {}", "✓".green(), format_status(status));
        }

        Command::Approve { id } => {
            let store = open_store(&root)?;
            let id = store
                .update(|graph| {
                    let id = graph.resolve_id(&id)?;
                    graph.approve(&id)?;
                    Ok(id)
                })
                .context("Failed to approve task")?;
            println!("{} Approved: {}", "✓".green(), short(&id));
        }

        Command::Order => {
            let store = open_store(&root)?;
            let graph = store.load()?;
            let topo = algo::topological_sort(&graph);
            for (i, id) in topo.order.iter().enumerate() {
                println!("{:>3}. {} {}", i + 1, short(id), title_of(&graph, id));
            }
            if topo.has_cycle() {
                println!("{} {} task(s) are on or behind a cycle:", "⊘".red(), topo.cycle_nodes.len());
                for id in &topo.cycle_nodes {
                    println!("     {} {}", short(id), title_of(&graph, id));
                }
            }
        }

        Command::Levels => {
            let store = open_store(&root)?;
            let graph = store.load()?;
            let levels = algo::execution_levels(&graph)?;
            for (i, level) in levels.iter().enumerate() {
                println!("{} {}", "Level".bold(), i);
                for id in level {
                    println!("  {} {}", short(id), title_of(&graph, id));
                }
            }
        }

        Command::Cycles => {
            let store = open_store(&root)?;
            let graph = store.load()?;
            let report = algo::detect_cycles(&graph);
            if !report.has_cycle() {
                println!("{} No cycles", "✓".green());
            }
            for cycle in &report.cycles {
                let path: Vec<String> = cycle.iter().map(|id| short(id).to_string()).collect();
                println!("{} {}", "⊘".red(), path.join(" -> "));
            }
        }

        Command::Search { query } => {
            let store = open_store(&root)?;
            let ids = store.search(&query.join(" "))?;
            if ids.is_empty() {
                println!("{}", "No matches".dimmed());
            } else {
                let graph = store.load()?;
                for node in ids.iter().filter_map(|id| graph.get_node(id)) {
                    print_task_line(node);
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
