use crate::cli::{
    ActivitiesCmd, BrowseArgs, Commands, CreateArgs, FilesArgs, GlobalArgs, LogsCmd,
    OffloadArgs, ParseArgs, PreviewArgs, ProjectsCmd, SaveArgs, TableArgs,
};
use crate::{columns, render};
use chrono_tz::Tz;
use eyre::{Result, WrapErr, bail, eyre};
use phenomate_console::ApiClient;
use phenomate_console::api::tail_bytes;
use phenomate_console::config::Config;
use phenomate_console::consts::{DEFAULT_ADDRESS, KEY_VALUE_RE, PREVIEW_DEBOUNCE};
use phenomate_console::context::{ProjectSelection, SessionContext};
use phenomate_console::datetime::format_dt;
use phenomate_console::name::{ParsedFile, RegexMap, parse_file_data};
use phenomate_console::preview::{Preview, PreviewDebouncer, PreviewInput, PreviewState};
use phenomate_console::table::{FilterVariant, Table, TableState};
use phenomate_console::types::{DirFileItem, OffloadForm, Project, ProjectCreate};
use phenomate_console::vfs::{FileSelection, LastDirStore, can_select, folder_chain};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Longest wait for an in-flight preview once stdin is exhausted.
const PREVIEW_SETTLE: Duration = Duration::from_secs(30);

/// Split `KEY=VALUE`, trimming both sides.
pub fn split_pair(raw: &str) -> Result<(&str, &str)> {
    let caps = KEY_VALUE_RE
        .captures(raw)
        .ok_or_else(|| eyre!("expected KEY=VALUE, got `{raw}`"))?;
    match (caps.get(1), caps.get(2)) {
        (Some(k), Some(v)) => Ok((k.as_str(), v.as_str())),
        _ => Err(eyre!("expected KEY=VALUE, got `{raw}`")),
    }
}

/// Build a table view from command-line filter, sort and paging flags.
pub fn table_state<R>(
    table: &Table<R>,
    args: &TableArgs,
    tz: Tz,
    default_page_size: usize,
) -> Result<TableState> {
    let mut state = TableState::default();
    for raw in &args.filters {
        let (column, value) = split_pair(raw)?;
        state.set_filter(column, table.resolve_filter(column, value, tz)?);
    }
    if let Some(column) = &args.sort {
        table.column(column)?;
        state.sort_by(column, args.desc);
    }
    state.set_page_size(args.page_size.unwrap_or(default_page_size));
    state.page_index = args.page.saturating_sub(1);
    Ok(state)
}

fn item_from_path(path: &str) -> Result<DirFileItem> {
    let chain = folder_chain(path)?;
    let name = chain
        .last()
        .map(|l| l.name.clone())
        .ok_or_else(|| eyre!("cannot offload the root directory"))?;
    Ok(DirFileItem {
        id: path.trim_end_matches('/').to_string(),
        name,
        is_dir: false,
        is_hidden: false,
        size: 0.0,
        mod_date: None,
    })
}

/// A bare file name as a listing entry, for offline parsing.
fn item_from_name(name: &str) -> DirFileItem {
    DirFileItem {
        id: name.to_string(),
        name: name.rsplit('/').next().unwrap_or(name).to_string(),
        is_dir: false,
        is_hidden: false,
        size: 0.0,
        mod_date: None,
    }
}

/// File a fetched log is saved under when no path is given.
fn log_file_name(log: &str, tail: Option<u64>) -> String {
    match tail {
        Some(bytes) => format!("{}_tail_{bytes}.log", log.replace('/', "_")),
        None => log.to_string(),
    }
}

fn write_log(text: &str, save: &SaveArgs, default_name: String) -> Result<()> {
    let path = match (&save.output, save.save) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from(default_name),
        (None, false) => {
            print!("{text}");
            return Ok(());
        }
    };
    std::fs::write(&path, text).wrap_err_with(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "saved log");
    Ok(())
}

fn print_preview(preview: &Preview) {
    println!("Directory: {}", preview.path);
    match preview.exists() {
        Some(true) => println!("Exists: yes"),
        Some(false) => println!("Exists: no"),
        None if preview.exists.is_empty() => {}
        None => println!("Exists: {}", preview.exists),
    }
}

pub struct Console {
    api: Arc<ApiClient>,
    config: Config,
    ctx: SessionContext,
    page_size: usize,
    state_path: Option<PathBuf>,
}

impl Console {
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let config = Config::load(global.config.as_deref())?;
        let settings = config.settings(global.url.as_deref(), global.timezone.as_deref())?;
        tracing::debug!(
            url = %settings.base_url,
            timezone = %settings.timezone,
            "settings resolved"
        );
        Ok(Self {
            api: Arc::new(ApiClient::new(&settings.base_url)?),
            ctx: SessionContext::new(settings.timezone, DEFAULT_ADDRESS),
            page_size: settings.page_size,
            state_path: global.state.clone().or_else(LastDirStore::default_path),
            config,
        })
    }

    pub async fn run(mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Projects(cmd) => self.projects(cmd).await,
            Commands::Activities(cmd) => self.activities(cmd).await,
            Commands::Browse(args) => self.browse(args).await,
            Commands::Files(args) => self.files(args).await,
            Commands::Parse(args) => self.parse(args),
            Commands::Offload(args) => self.offload(args).await,
            Commands::Researchers => {
                let people = self.api.list_researchers().await?;
                render::print_names("Researcher", people.iter().map(|r| r.name.as_str()));
                Ok(())
            }
            Commands::Organisations => {
                let orgs = self.api.list_organisations().await?;
                render::print_names("Organisation", orgs.iter().map(|o| o.name.as_str()));
                Ok(())
            }
            Commands::Logs(cmd) => self.logs(cmd).await,
        }
    }

    async fn logs(&self, cmd: LogsCmd) -> Result<()> {
        match cmd {
            LogsCmd::Tail { log, bytes, save } => {
                let bytes = tail_bytes(bytes);
                let text = self.api.tail_log(&log, Some(bytes)).await?;
                write_log(&text, &save, log_file_name(&log, Some(bytes)))
            }
            LogsCmd::Download { log, save } => {
                let text = self.api.download_log(&log).await?;
                write_log(&text, &save, log_file_name(&log, None))
            }
        }
    }

    /// Print a page of `rows`, or the facets of one column when asked.
    fn show<R>(&self, table: &Table<R>, rows: &[R], args: &TableArgs) -> Result<()> {
        if let Some(column) = &args.facets {
            let extent = match table.column(column)?.filter {
                Some(FilterVariant::Range) => table.min_max(rows, column)?,
                _ => None,
            };
            let values = table.unique_values(rows, column)?;
            render::print_facets(column, &values, extent);
            return Ok(());
        }
        let state = table_state(table, args, self.ctx.timezone, self.page_size)?;
        let page = table.apply(rows, &state)?;
        render::print_page(table, &page, self.ctx.timezone);
        Ok(())
    }

    fn regex_map(&self, project: Option<i64>, overrides: &[String]) -> Result<RegexMap> {
        let mut map = self.config.regex_map(project)?;
        for raw in overrides {
            let (ext, pattern) = split_pair(raw)?;
            map.insert(ext, pattern)?;
        }
        Ok(map)
    }

    fn last_dirs(&self) -> Result<Option<LastDirStore>> {
        self.state_path
            .as_deref()
            .map(LastDirStore::open)
            .transpose()
    }

    /// Explicit path, else the remembered directory of `field`, else the default.
    fn start_address(&mut self, path: Option<&str>, field: &str) -> Result<()> {
        let remembered = match path {
            Some(_) => None,
            None => self
                .last_dirs()?
                .and_then(|s| s.get(field).map(str::to_string))
                .filter(|d| !d.is_empty()),
        };
        let address = path.map(str::to_string).or(remembered);
        if let Some(address) = address {
            self.ctx.set_address(&address)?;
        }
        Ok(())
    }

    async fn listing(&self, dir_only: bool, hidden: bool) -> Result<Vec<DirFileItem>> {
        let chain = folder_chain(&self.ctx.address)?;
        let crumbs: Vec<&str> = chain.iter().map(|l| l.name.as_str()).collect();
        println!("/{}", crumbs.join(" / "));
        let entries = self.api.list_dir(&self.ctx.address, dir_only).await?;
        Ok(entries
            .into_iter()
            .filter(|e| hidden || !e.is_hidden)
            .collect())
    }

    async fn projects(&self, cmd: ProjectsCmd) -> Result<()> {
        match cmd {
            ProjectsCmd::List(args) => {
                let projects = self.api.list_projects().await?;
                self.show(&columns::projects(), &projects, &args)
            }
            ProjectsCmd::Show { id } => {
                let project = self.api.get_project(id).await?;
                self.print_project(&project);
                Ok(())
            }
            ProjectsCmd::Create(args) => self.create_project(args).await,
            ProjectsCmd::Delete { ids } => {
                if let [id] = ids.as_slice() {
                    self.api.delete_project(*id).await?;
                } else {
                    self.api.delete_projects(&ids).await?;
                }
                tracing::info!(count = ids.len(), "deleted project(s)");
                Ok(())
            }
            ProjectsCmd::Preview(args) => self.preview(args).await,
        }
    }

    fn print_project(&self, p: &Project) {
        let tz = self.ctx.timezone;
        let selection = ProjectSelection::from_project(p);
        render::print_record(&[
            ("Id", p.id.to_string()),
            ("Name", p.name.clone()),
            ("Location", selection.directory.unwrap_or_default()),
            ("Year", p.year.to_string()),
            ("Updated", format_dt(tz, Some(&p.updated), true)),
            ("Researcher", p.researcher_name.clone().unwrap_or_default()),
            ("Organisation", p.organisation_name.clone().unwrap_or_default()),
            ("Internal", p.internal.to_string()),
            ("Valid", p.is_valid.to_string()),
            ("Summary", p.summary.clone().unwrap_or_default()),
        ]);
    }

    async fn create_project(&self, args: CreateArgs) -> Result<()> {
        let body = ProjectCreate {
            year: args.year,
            summary: args.summary,
            template: args.template,
            internal: !args.external,
            researcher_name: args.researcher,
            organisation_name: args.organisation,
            root: args.root,
        };
        let project = self.api.create_project(&body).await?;
        tracing::info!(id = project.id, name = %project.name, "created project");
        self.print_project(&project);
        Ok(())
    }

    async fn preview(&self, args: PreviewArgs) -> Result<()> {
        let watch = args.watch;
        let input = PreviewInput {
            year: args.year,
            summary: args.summary,
            project: args.project,
            site: args.site,
            platform: args.platform,
            root: args.root,
            internal: args.internal,
            template: args.template,
            researcher_name: args.researcher,
            organisation_name: args.organisation,
        };
        if watch {
            return self.watch_preview(input).await;
        }
        if input.is_empty() {
            bail!("nothing to preview; pass at least one field or use --watch");
        }
        let text = self.api.project_preview(&input).await?;
        print_preview(&Preview::parse(&text));
        Ok(())
    }

    /// Feed `FIELD=VALUE` lines from stdin through the debouncer and print
    /// each preview that survives.
    async fn watch_preview(&self, mut input: PreviewInput) -> Result<()> {
        let mut debouncer = PreviewDebouncer::new(Arc::clone(&self.api));
        let mut updates = debouncer.subscribe();
        let printer = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                match state {
                    PreviewState::Ready(preview) => print_preview(&preview),
                    PreviewState::Failed(err) => tracing::warn!("preview failed: {err}"),
                    PreviewState::Loading => tracing::debug!("preview loading"),
                    PreviewState::Idle => {}
                }
            }
        });

        if !input.is_empty() {
            debouncer.update(input.clone());
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match split_pair(line).and_then(|(field, value)| input.set(field, value)) {
                Ok(()) => {
                    debouncer.update(input.clone());
                }
                Err(err) => tracing::warn!("{err}"),
            }
        }

        // let the last edit fire, then wait for its answer
        tokio::time::sleep(PREVIEW_DEBOUNCE + Duration::from_millis(50)).await;
        let mut settled = debouncer.subscribe();
        let finished = tokio::time::timeout(
            PREVIEW_SETTLE,
            settled.wait_for(|s| !matches!(s, PreviewState::Loading)),
        )
        .await
        .is_ok();
        if !finished {
            tracing::warn!("gave up waiting for the last preview");
        }
        drop(debouncer);
        let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
        Ok(())
    }

    async fn activities(&self, cmd: ActivitiesCmd) -> Result<()> {
        match cmd {
            ActivitiesCmd::List { project_id, table } => {
                let activities = self.api.list_activities(project_id).await?;
                self.show(&columns::activities(), &activities, &table)?;
                let restartable = activities
                    .iter()
                    .filter(|a| a.status.is_restartable())
                    .count();
                if restartable > 0 && table.facets.is_none() {
                    println!(
                        "{restartable} can be restarted with `phenomate activities restart ID`"
                    );
                }
                Ok(())
            }
            ActivitiesCmd::Restart { id } => {
                self.api.restart_activity(id).await?;
                tracing::info!(id, "activity re-queued");
                Ok(())
            }
            ActivitiesCmd::Cancel { id } => {
                self.api.cancel_activity(id).await?;
                tracing::info!(id, "activity removed");
                Ok(())
            }
            ActivitiesCmd::Delete { ids } => {
                self.api.delete_activities(&ids).await?;
                tracing::info!(count = ids.len(), "activities removed");
                Ok(())
            }
            ActivitiesCmd::Clear { project_id } => {
                self.api.delete_project_activities(project_id).await?;
                tracing::info!(project_id, "activity log cleared");
                Ok(())
            }
        }
    }

    async fn browse(&mut self, args: BrowseArgs) -> Result<()> {
        self.start_address(args.path.as_deref(), &args.field)?;
        let entries = self.listing(args.dir_only, args.all).await?;
        self.show(&columns::listing(), &entries, &args.table)
    }

    async fn files(&mut self, args: FilesArgs) -> Result<()> {
        let map = self.regex_map(args.project, &args.patterns)?;
        self.start_address(args.path.as_deref(), &args.field)?;
        let rows: Vec<ParsedFile> = self
            .listing(false, false)
            .await?
            .into_iter()
            .map(|item| parse_file_data(item, &map))
            .collect();
        let unparsed = rows.iter().filter(|r| !r.is_parsed()).count();
        tracing::debug!(rows = rows.len(), unparsed, "parsed listing");
        self.show(&columns::parsed_files(), &rows, &args.table)
    }

    fn parse(&self, args: ParseArgs) -> Result<()> {
        let map = self.regex_map(args.project, &args.patterns)?;
        let rows: Vec<ParsedFile> = args
            .names
            .iter()
            .map(|name| parse_file_data(item_from_name(name), &map))
            .collect();
        self.show(&columns::parsed_files(), &rows, &args.table)
    }

    async fn offload(&mut self, args: OffloadArgs) -> Result<()> {
        let mut selection = FileSelection::new();
        for path in &args.paths {
            selection.add([item_from_path(path)?]);
        }

        if let Some(dir) = &args.from {
            self.ctx.set_address(dir)?;
            let map = self.regex_map(Some(args.project_id), &args.patterns)?;
            let rows: Vec<ParsedFile> = self
                .api
                .list_dir(dir, false)
                .await?
                .into_iter()
                .filter(|e| !e.is_hidden)
                .map(|item| parse_file_data(item, &map))
                .collect();
            let table = columns::parsed_files();
            let filters = TableArgs {
                filters: args.filters.clone(),
                ..TableArgs::default()
            };
            let state = table_state(&table, &filters, self.ctx.timezone, rows.len().max(1))?;
            let page = table.apply(&rows, &state)?;
            let added = selection.add(page.rows.iter().map(|(_, f)| f.item.clone()));
            tracing::info!(
                dir = %dir,
                matched = page.filtered,
                added,
                "selected from directory"
            );
        } else if !args.filters.is_empty() {
            bail!("--filter only applies together with --from");
        }

        if !can_select(selection.len(), true) {
            bail!("nothing selected to offload");
        }
        let form = OffloadForm {
            src_files: selection.ids(),
            site: args.site.clone(),
        };

        if args.dry_run {
            render::print_names("Selected", form.src_files.iter().map(String::as_str));
            println!(
                "{} file(s) for site `{}` of project {}",
                form.src_files.len(),
                form.site,
                args.project_id
            );
            return Ok(());
        }

        let project = self.api.get_project(args.project_id).await?;
        let target = ProjectSelection::from_project(&project).with_site(&args.site);
        self.api.offload(args.project_id, &form).await?;
        if let (Some(mut store), Some(first)) = (self.last_dirs()?, selection.items().first()) {
            store.remember(&args.field, &first.id)?;
        }
        println!(
            "Queued {} file(s) into {}",
            form.src_files.len(),
            target.target_dir().unwrap_or(project.name)
        );
        Ok(())
    }
}
