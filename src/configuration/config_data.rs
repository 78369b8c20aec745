use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::backup;
use super::codec;
use super::DangerZone;
use super::ZoneGuard;
use super::ZoneLock;
use crate::file_io::write_into_file;
use crate::time::version_stamp;
use crate::tree::is_valid_name;
use crate::tree::is_valid_value;
use crate::ConfigTree;
use crate::ConfigurationSettings;
use crate::Error;
use crate::Result;
use crate::StorageError;
use crate::SystemError;

const DEFAULT_VERSION: &str = "0";
const DEFAULT_REFRESH_TIME: u64 = 300;
const DEFAULT_PROPAGATION_TIME: u64 = 300;
const DEFAULT_SLAVES_GRACE_TIME: u64 = 600;
const LOCAL_SITE_PATH: &str = "/LocalSite/Site";
const GATEWAYS_PATH: &str = "/DIRAC/Gateways";

/// Tree a write is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Local,
    Remote,
}

/// Tree a lookup is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Merged,
    Local,
    Remote,
}

/// The two owned layers. Only reachable through the danger zone.
#[derive(Debug, Default)]
pub struct Trees {
    local: ConfigTree,
    remote: ConfigTree,
}

impl Trees {
    pub fn local(&self) -> &ConfigTree {
        &self.local
    }

    pub fn remote(&self) -> &ConfigTree {
        &self.remote
    }

    fn layer_mut(
        &mut self,
        layer: Layer,
    ) -> &mut ConfigTree {
        match layer {
            Layer::Local => &mut self.local,
            Layer::Remote => &mut self.remote,
        }
    }
}

/// State derived from both layers, replaced wholesale by [`ConfigData::sync`].
#[derive(Debug, Default)]
pub struct MergedSnapshot {
    merged: ConfigTree,
    servers: Vec<String>,
    compressed: Vec<u8>,
}

impl MergedSnapshot {
    pub fn merged(&self) -> &ConfigTree {
        &self.merged
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// DEFLATE compressed text of the remote layer
    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }
}

/// Two-layer configuration store.
///
/// `local` holds what the operator provided, `remote` what peers pushed.
/// Readers see the merged overlay where local options win.
///
/// Every mutation follows the same pattern: change a layer under the writer
/// lock, release it, then call [`ConfigData::sync`]. A reader arriving
/// between the unlock and the end of the sync can still observe the previous
/// merged snapshot; it never observes a partially applied write.
pub struct ConfigData {
    settings: ConfigurationSettings,
    trees: DangerZone<Trees>,
    derived: ArcSwap<MergedSnapshot>,
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .collect()
}

fn walk<'a>(
    tree: &'a ConfigTree,
    sections: &[&str],
) -> Option<&'a ConfigTree> {
    sections
        .iter()
        .try_fold(tree, |current, name| current.section(name))
}

fn walk_or_create<'a>(
    tree: &'a mut ConfigTree,
    sections: &[&str],
) -> Option<&'a mut ConfigTree> {
    let mut current = tree;
    for name in sections {
        current = current.create_new_section(name)?;
    }
    Some(current)
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = String> + '_ {
    value
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_flag(
    value: Option<&str>,
    default: bool,
) -> bool {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "no" | "false" | "n") => false,
        Some(v) if matches!(v.as_str(), "yes" | "true" | "y") => true,
        _ => default,
    }
}

impl ConfigData {
    pub fn new(settings: ConfigurationSettings) -> Self {
        let data = Self {
            settings,
            trees: DangerZone::new(Trees::default()),
            derived: ArcSwap::from_pointee(MergedSnapshot::default()),
        };
        data.sync();
        data
    }

    pub fn settings(&self) -> &ConfigurationSettings {
        &self.settings
    }

    // ----------------------------------------------------------------------
    // Danger zone

    /// Joins the readers of the layers. Blocks while a writer holds the lock.
    pub fn enter_danger_zone(&self) -> ZoneGuard<'_, Trees> {
        self.trees.enter()
    }

    /// Takes exclusive access to the layers, waiting out readers already inside.
    pub fn lock(&self) -> ZoneLock<'_, Trees> {
        self.trees.lock()
    }

    pub fn readers_inside(&self) -> usize {
        self.trees.readers_inside()
    }

    // ----------------------------------------------------------------------
    // Derived state

    /// Recomputes the merged tree, the server list and the compressed snapshot.
    pub fn sync(&self) {
        let zone = self.trees.enter();

        let merged = zone.remote.merge_with(&zone.local);

        let servers_option = self.settings.option_path("Servers");
        let servers_path = split_path(&servers_option);
        let mut servers: Vec<String> = Vec::new();
        for tree in [&zone.local, &zone.remote] {
            for server in split_list(extract_from(tree, &servers_path)) {
                if !servers.contains(&server) {
                    servers.push(server);
                }
            }
        }

        let compressed = match codec::compress(zone.remote.to_string().as_bytes()) {
            Ok(buf) => buf,
            Err(e) => {
                error!("failed to compress remote configuration: {:?}", e);
                self.derived.load().compressed.clone()
            }
        };

        // Stored while still inside the zone so no writer can slip in between
        self.derived.store(Arc::new(MergedSnapshot {
            merged,
            servers,
            compressed,
        }));
        debug!("configuration synced");
    }

    pub fn snapshot(&self) -> Arc<MergedSnapshot> {
        self.derived.load_full()
    }

    pub fn compressed_data(&self) -> Vec<u8> {
        self.derived.load().compressed.clone()
    }

    pub fn servers(&self) -> Vec<String> {
        self.derived.load().servers.clone()
    }

    pub fn merged_tree(&self) -> ConfigTree {
        self.derived.load().merged.clone()
    }

    pub fn local_tree(&self) -> ConfigTree {
        self.trees.enter().local.clone()
    }

    pub fn remote_tree(&self) -> ConfigTree {
        self.trees.enter().remote.clone()
    }

    // ----------------------------------------------------------------------
    // Lookups

    fn read_view<R>(
        &self,
        view: View,
        f: impl FnOnce(&ConfigTree) -> Option<R>,
    ) -> Option<R> {
        let zone = self.trees.enter();
        match view {
            View::Merged => f(&self.derived.load().merged),
            View::Local => f(&zone.local),
            View::Remote => f(&zone.remote),
        }
    }

    /// Names of the sections below `path`, `None` if `path` is not a section.
    pub fn get_sections(
        &self,
        path: &str,
        view: View,
    ) -> Option<Vec<String>> {
        let levels = split_path(path);
        self.read_view(view, |tree| walk(tree, &levels).map(ConfigTree::list_sections))
    }

    /// Names of the options below `path`, `None` if `path` is not a section.
    pub fn get_options(
        &self,
        path: &str,
        view: View,
    ) -> Option<Vec<String>> {
        let levels = split_path(path);
        self.read_view(view, |tree| walk(tree, &levels).map(ConfigTree::list_options))
    }

    /// Value of the option at `path`, `None` if absent.
    pub fn extract_option(
        &self,
        path: &str,
        view: View,
    ) -> Option<String> {
        let levels = split_path(path);
        self.read_view(view, |tree| extract_from(tree, &levels).map(str::to_string))
    }

    /// Value of the option at `path` in the merged view
    pub fn get_option(
        &self,
        path: &str,
    ) -> Option<String> {
        self.extract_option(path, View::Merged)
    }

    // ----------------------------------------------------------------------
    // Mutations

    /// Sets the option at `path` in the local layer.
    pub fn set_option(
        &self,
        path: &str,
        value: &str,
    ) -> bool {
        self.set_option_in(Layer::Local, path, value)
    }

    /// Sets the option at `path`, creating missing sections on the way.
    ///
    /// Returns `false` when `path` is empty, crosses an existing option, or
    /// holds a name or a value that could not be shipped to peers as text.
    pub fn set_option_in(
        &self,
        layer: Layer,
        path: &str,
        value: &str,
    ) -> bool {
        let levels = split_path(path);
        if !levels.iter().all(|level| is_valid_name(level)) || !is_valid_value(value) {
            warn!("refusing to set {:?} = {:?} in {:?} layer", path, value, layer);
            return false;
        }
        let applied = {
            let mut trees = self.trees.lock();
            match levels.split_last() {
                Some((option, sections)) => match walk_or_create(trees.layer_mut(layer), sections) {
                    Some(section) => section.set_option(option, value),
                    None => false,
                },
                None => false,
            }
        };
        if !applied {
            warn!("cannot set {:?} in {:?} layer", path, layer);
        }
        self.sync();
        applied
    }

    /// Deletes the option at `path` from the local layer.
    pub fn delete_local_option(
        &self,
        path: &str,
    ) -> bool {
        let levels = split_path(path);
        let removed = {
            let mut trees = self.trees.lock();
            match levels.split_last() {
                Some((option, sections)) => {
                    let section = sections
                        .iter()
                        .try_fold(&mut trees.local, |current, name| current.section_mut(name));
                    match section {
                        Some(section) if section.option(option).is_some() => section.delete(option).is_some(),
                        _ => false,
                    }
                }
                None => false,
            }
        };
        if removed {
            self.sync();
        }
        removed
    }

    /// Union-merges the tree stored at `path` into the local layer.
    ///
    /// A missing or malformed file is logged and leaves the store untouched.
    /// Returns whether anything was merged.
    pub fn load_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<bool> {
        let path = path.as_ref();
        let loaded = match ConfigTree::load_from_file(path) {
            Ok(tree) => tree,
            Err(Error::System(SystemError::Storage(StorageError::PathError { source, .. })))
                if source.kind() == ErrorKind::NotFound =>
            {
                warn!("configuration file {:?} does not exist", path);
                return Ok(false);
            }
            Err(Error::System(SystemError::Codec(e))) => {
                warn!("can't load configuration file {:?}: {}", path, e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.merge_with_local(&loaded);
        info!("loaded configuration file {:?}", path);
        Ok(true)
    }

    pub fn merge_with_local(
        &self,
        extra: &ConfigTree,
    ) {
        {
            let mut trees = self.trees.lock();
            trees.local.merge_in_place(extra);
        }
        self.sync();
    }

    /// Replaces the remote layer with a peer's full compressed state.
    ///
    /// Unlike local loads, a payload that does not decompress or parse is a
    /// hard failure: it points at a protocol problem with the peer.
    pub fn load_remote_from_compressed_buffer(
        &self,
        data: &[u8],
    ) -> Result<()> {
        let raw = codec::decompress(data).map_err(|e| {
            error!("rejecting remote configuration: {:?}", e);
            e
        })?;
        let tree = ConfigTree::load_from_buffer(&raw).map_err(|e| {
            error!("rejecting remote configuration: {:?}", e);
            e
        })?;
        self.set_remote_tree(tree);
        Ok(())
    }

    pub fn set_remote_tree(
        &self,
        tree: ConfigTree,
    ) {
        {
            let mut trees = self.trees.lock();
            trees.remote = tree;
        }
        self.sync();
    }

    // ----------------------------------------------------------------------
    // Well-known options

    fn int_option(
        &self,
        name: &str,
        view: View,
        default: u64,
    ) -> u64 {
        let path = self.settings.option_path(name);
        match self.extract_option(&path, view) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("{} = {:?} is not an integer, using {}", path, raw, default);
                default
            }),
            None => default,
        }
    }

    fn flag_option(
        &self,
        name: &str,
        view: View,
        default: bool,
    ) -> bool {
        parse_flag(
            self.extract_option(&self.settings.option_path(name), view)
                .as_deref(),
            default,
        )
    }

    pub fn version(&self) -> String {
        self.extract_option(&self.settings.option_path("Version"), View::Remote)
            .unwrap_or_else(|| DEFAULT_VERSION.to_string())
    }

    pub fn set_version(
        &self,
        version: &str,
    ) {
        self.set_option_in(Layer::Remote, &self.settings.option_path("Version"), version);
    }

    /// Stamps the remote layer with the current UTC time and returns the stamp.
    pub fn generate_new_version(&self) -> String {
        let version = version_stamp(Utc::now());
        self.set_version(&version);
        info!("new configuration version {}", version);
        version
    }

    pub fn name(&self) -> Option<String> {
        self.extract_option(&self.settings.option_path("Name"), View::Merged)
    }

    pub fn refresh_time(&self) -> u64 {
        self.int_option("RefreshTime", View::Merged, DEFAULT_REFRESH_TIME)
    }

    /// Reload cadence: `RefreshTime` seconds when the tree carries it, the
    /// configured poll interval otherwise.
    pub fn refresh_period(&self) -> Duration {
        match self.get_option(&self.settings.option_path("RefreshTime")) {
            Some(_) => Duration::from_secs(self.refresh_time().max(1)),
            None => self.settings.refresh_poll(),
        }
    }

    pub fn propagation_time(&self) -> u64 {
        self.int_option("PropagationTime", View::Merged, DEFAULT_PROPAGATION_TIME)
    }

    pub fn slaves_grace_time(&self) -> u64 {
        self.int_option("SlavesGraceTime", View::Merged, DEFAULT_SLAVES_GRACE_TIME)
    }

    pub fn auto_publish(&self) -> bool {
        self.flag_option("AutoPublish", View::Merged, true)
    }

    pub fn is_master(&self) -> bool {
        self.flag_option("Master", View::Local, false)
    }

    pub fn is_service(&self) -> bool {
        self.flag_option("Service", View::Local, false)
    }

    pub fn master_server(&self) -> Option<String> {
        self.extract_option(&self.settings.option_path("MasterServer"), View::Remote)
    }

    /// Gateway URL configured for the local site
    pub fn gateway(&self) -> Option<String> {
        let site = self.get_option(LOCAL_SITE_PATH)?;
        self.get_option(&format!("{GATEWAYS_PATH}/{site}"))
    }

    // ----------------------------------------------------------------------
    // Persistence

    pub fn dump_local_to_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let text = self.trees.enter().local.to_string();
        write_into_file(path.as_ref(), text.as_bytes())
    }

    pub fn dump_remote_to_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let text = self.trees.enter().remote.to_string();
        write_into_file(path.as_ref(), text.as_bytes())
    }

    /// Writes the remote layer to `<etc_dir>/<name>.cfg`.
    ///
    /// The file being replaced is first archived under `backup_dir`, tagged
    /// with `backup_tag` or the current version. A failed backup is logged
    /// and the overwrite still happens.
    pub fn write_remote_configuration_to_disk(
        &self,
        backup_tag: Option<&str>,
    ) -> Result<PathBuf> {
        let name = self
            .name()
            .ok_or_else(|| Error::MissingOption(self.settings.option_path("Name")))?;
        let target = self.settings.etc_dir.join(format!("{name}.cfg"));
        let tag = backup_tag
            .map(str::to_string)
            .unwrap_or_else(|| self.version());

        if let Err(e) = backup::archive_file(&target, &self.settings.backup_dir, &tag, Utc::now()) {
            error!("failed to back up {:?}: {:?}", target, e);
        }

        self.dump_remote_to_file(&target)?;
        info!("remote configuration written to {:?}", target);
        Ok(target)
    }
}

fn extract_from<'a, S: AsRef<str>>(
    tree: &'a ConfigTree,
    levels: &[S],
) -> Option<&'a str> {
    let (option, sections) = levels.split_last()?;
    let section = sections
        .iter()
        .try_fold(tree, |current, name| current.section(name.as_ref()))?;
    section.option(option.as_ref())
}
