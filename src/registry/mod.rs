//! Product registry: canonical identities and the immutable alias index.
//!
//! A [`RegistrySnapshot`] is built once per load and never mutated. Reload
//! builds a fresh snapshot and swaps it into the [`SharedRegistry`] holder;
//! matches already running keep the snapshot they started with.
//!
//! Alias collisions across products are resolved deterministically at build
//! time: canonical-name entries outrank plain aliases, longer surface forms
//! outrank shorter ones, and first registration wins remaining ties. Losing
//! contenders stay in the bucket as alternates for audit.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::normalize::normalize;

/// Authoritative identity record for one real-world product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProduct {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub canonical_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// id-type → value, e.g. `upc`, `asin`.
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub verification_sources: Vec<String>,
}

fn default_status() -> String {
    "active".into()
}

/// Whether an index entry came from the canonical name or an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    Canonical,
    Alias,
}

/// One claim on a normalized alias string.
#[derive(Debug, Clone, Serialize)]
pub struct AliasClaim {
    pub product_id: String,
    /// The surface form as registered, before normalization.
    pub surface: String,
    pub kind: AliasKind,
    /// Position in registry iteration order; lower registered first.
    pub order: usize,
}

/// All products claiming one normalized alias. `claims[0]` is the winner.
#[derive(Debug, Clone, Serialize)]
pub struct AliasBucket {
    pub normalized: String,
    pub claims: Vec<AliasClaim>,
}

impl AliasBucket {
    pub fn winner(&self) -> &AliasClaim {
        &self.claims[0]
    }

    pub fn is_ambiguous(&self) -> bool {
        self.claims
            .iter()
            .any(|c| c.product_id != self.claims[0].product_id)
    }
}

/// Entry in the priority-ordered containment scan list.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub normalized: String,
    pub product_id: String,
    pub kind: AliasKind,
}

/// A brand known to the registry, with the products carrying it.
#[derive(Debug, Clone)]
pub struct BrandEntry {
    pub normalized: String,
    pub display: String,
    pub product_ids: Vec<String>,
}

/// Per-entry rejection recorded during a load.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntry {
    pub key: String,
    pub reason: String,
}

/// Non-fatal cross-product alias collision recorded during a load.
#[derive(Debug, Clone, Serialize)]
pub struct AliasWarning {
    pub alias: String,
    pub winner: String,
    pub contenders: Vec<String>,
}

/// Outcome of one registry load: what made it in and what did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: Vec<RejectedEntry>,
    pub ambiguous_aliases: Vec<AliasWarning>,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "loaded {} products ({} rejected, {} ambiguous aliases)",
            self.loaded,
            self.rejected.len(),
            self.ambiguous_aliases.len()
        )?;
        for entry in &self.rejected {
            writeln!(f, "  rejected {}: {}", entry.key, entry.reason)?;
        }
        for warning in &self.ambiguous_aliases {
            writeln!(
                f,
                "  alias \"{}\" -> {} (contenders: {})",
                warning.alias,
                warning.winner,
                warning.contenders.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Immutable index over one loaded registry.
#[derive(Debug)]
pub struct RegistrySnapshot {
    products: HashMap<String, CanonicalProduct>,
    alias_index: HashMap<String, AliasBucket>,
    /// Sorted: canonical entries first, then longer normalized forms, then
    /// registration order. Stage-1 containment walks this in order.
    scan_order: Vec<ScanEntry>,
    brands: Vec<BrandEntry>,
    built_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Build an empty snapshot (everything will fall back).
    pub fn empty() -> Self {
        Self {
            products: HashMap::new(),
            alias_index: HashMap::new(),
            scan_order: Vec::new(),
            brands: Vec::new(),
            built_at: Utc::now(),
        }
    }

    /// Build a snapshot from raw keyed entries, validating each one.
    ///
    /// Malformed entries are rejected individually; the rest still load.
    /// Returns an error only when every entry was rejected.
    pub fn from_entries(
        entries: BTreeMap<String, serde_json::Value>,
    ) -> Result<(Self, LoadReport), RegistryError> {
        let mut report = LoadReport::default();
        let mut products: Vec<CanonicalProduct> = Vec::new();

        for (key, value) in entries {
            match serde_json::from_value::<CanonicalProduct>(value) {
                Ok(mut product) => {
                    if product.product_id.is_empty() {
                        product.product_id = key.clone();
                    }
                    if product.product_id.is_empty() {
                        report.rejected.push(RejectedEntry {
                            key,
                            reason: "missing product_id".into(),
                        });
                        continue;
                    }
                    if product.canonical_name.trim().is_empty() {
                        report.rejected.push(RejectedEntry {
                            key,
                            reason: "missing canonical_name".into(),
                        });
                        continue;
                    }
                    products.push(product);
                }
                Err(e) => {
                    report.rejected.push(RejectedEntry {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if products.is_empty() && !report.rejected.is_empty() {
            return Err(RegistryError::Empty {
                rejected: report.rejected.len(),
            });
        }

        let snapshot = Self::build(products, &mut report);
        report.loaded = snapshot.products.len();
        Ok((snapshot, report))
    }

    /// Load and index a registry JSON file.
    pub fn load_file(path: &Path) -> Result<(Self, LoadReport), RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let entries: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| RegistryError::Parse {
                message: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Convenience for programmatic construction from validated products.
    pub fn from_products(products: Vec<CanonicalProduct>) -> Self {
        let mut report = LoadReport::default();
        Self::build(products, &mut report)
    }

    fn build(products: Vec<CanonicalProduct>, report: &mut LoadReport) -> Self {
        let mut index: HashMap<String, AliasBucket> = HashMap::new();
        let mut by_id: HashMap<String, CanonicalProduct> = HashMap::new();
        let mut brand_map: BTreeMap<String, BrandEntry> = BTreeMap::new();

        for (order, product) in products.into_iter().enumerate() {
            // Duplicate product_id keeps the first registration.
            if by_id.contains_key(&product.product_id) {
                report.rejected.push(RejectedEntry {
                    key: product.product_id.clone(),
                    reason: "duplicate product_id".into(),
                });
                continue;
            }

            let mut claim = |index: &mut HashMap<String, AliasBucket>,
                             surface: &str,
                             kind: AliasKind| {
                let normalized = normalize(surface);
                if normalized.is_empty() {
                    return;
                }
                let bucket = index
                    .entry(normalized.clone())
                    .or_insert_with(|| AliasBucket {
                        normalized,
                        claims: Vec::new(),
                    });
                // Case-insensitive unique per product; the canonical name is
                // claimed first, so a later alias duplicate is dropped here.
                if bucket
                    .claims
                    .iter()
                    .any(|c| c.product_id == product.product_id)
                {
                    return;
                }
                bucket.claims.push(AliasClaim {
                    product_id: product.product_id.clone(),
                    surface: surface.to_string(),
                    kind,
                    order,
                });
            };

            claim(&mut index, &product.canonical_name, AliasKind::Canonical);
            for alias in &product.aliases {
                claim(&mut index, alias, AliasKind::Alias);
            }

            if !product.brand.trim().is_empty() {
                let normalized = normalize(&product.brand);
                if !normalized.is_empty() {
                    brand_map
                        .entry(normalized.clone())
                        .or_insert_with(|| BrandEntry {
                            normalized,
                            display: product.brand.clone(),
                            product_ids: Vec::new(),
                        })
                        .product_ids
                        .push(product.product_id.clone());
                }
            }

            by_id.insert(product.product_id.clone(), product);
        }

        // Resolve collisions: canonical > longer surface > first registered.
        for bucket in index.values_mut() {
            bucket.claims.sort_by(|a, b| {
                let rank = |c: &AliasClaim| match c.kind {
                    AliasKind::Canonical => 0u8,
                    AliasKind::Alias => 1,
                };
                rank(a)
                    .cmp(&rank(b))
                    .then_with(|| {
                        b.surface
                            .chars()
                            .count()
                            .cmp(&a.surface.chars().count())
                    })
                    .then_with(|| a.order.cmp(&b.order))
            });
            if bucket.is_ambiguous() {
                report.ambiguous_aliases.push(AliasWarning {
                    alias: bucket.normalized.clone(),
                    winner: bucket.winner().product_id.clone(),
                    contenders: bucket
                        .claims
                        .iter()
                        .skip(1)
                        .map(|c| c.product_id.clone())
                        .collect(),
                });
            }
        }

        let mut scan_order: Vec<ScanEntry> = index
            .values()
            .map(|bucket| {
                let winner = bucket.winner();
                ScanEntry {
                    normalized: bucket.normalized.clone(),
                    product_id: winner.product_id.clone(),
                    kind: winner.kind,
                }
            })
            .collect();
        scan_order.sort_by(|a, b| {
            let rank = |e: &ScanEntry| match e.kind {
                AliasKind::Canonical => 0u8,
                AliasKind::Alias => 1,
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| b.normalized.chars().count().cmp(&a.normalized.chars().count()))
                .then_with(|| a.normalized.cmp(&b.normalized))
        });

        Self {
            products: by_id,
            alias_index: index,
            scan_order,
            brands: brand_map.into_values().collect(),
            built_at: Utc::now(),
        }
    }

    /// Look up a product by canonical id.
    pub fn get(&self, product_id: &str) -> Option<&CanonicalProduct> {
        self.products.get(product_id)
    }

    /// O(1) lookup of a whole-string alias hit.
    pub fn exact_bucket(&self, normalized: &str) -> Option<&AliasBucket> {
        self.alias_index.get(normalized)
    }

    /// Containment scan list in resolution-priority order.
    pub fn scan_entries(&self) -> &[ScanEntry] {
        &self.scan_order
    }

    /// All brands known to the registry.
    pub fn brands(&self) -> &[BrandEntry] {
        &self.brands
    }

    pub fn products(&self) -> impl Iterator<Item = &CanonicalProduct> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.alias_index.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Holder for the active snapshot. Readers clone the `Arc` and never block
/// on a reload; a swap replaces the pointer for future readers only.
pub struct SharedRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    generation: AtomicU64,
}

impl SharedRegistry {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(1),
        }
    }

    /// The snapshot current at this instant.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().expect("registry lock poisoned").clone()
    }

    /// Atomically install a new snapshot, returning the one it replaced.
    pub fn swap(&self, next: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let mut guard = self.current.write().expect("registry lock poisoned");
        self.generation.fetch_add(1, Ordering::Relaxed);
        std::mem::replace(&mut *guard, Arc::new(next))
    }

    /// Reload from a registry file and swap on success.
    pub fn reload_file(&self, path: &Path) -> Result<LoadReport, RegistryError> {
        let (snapshot, report) = RegistrySnapshot::load_file(path)?;
        tracing::info!(
            products = snapshot.len(),
            aliases = snapshot.alias_count(),
            rejected = report.rejected.len(),
            "registry reloaded"
        );
        self.swap(snapshot);
        Ok(report)
    }

    /// Monotonic swap counter, starting at 1 for the initial snapshot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}
