//! Read-only snapshot access and the well-known key → path table.
//!
//! The snapshot is a nested bundle with the regions `identity`,
//! `environment`, `time`, `student` and `flags`, built by the caller before a
//! resolution pass. Well-known context keys map onto dotted paths inside it;
//! keys starting with [`FLAG_PREFIX`] map onto `flags.<name>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix that routes a context key to the `flags` region.
pub const FLAG_PREFIX: &str = "flag_";

/// Immutable snapshot of identity, environment, time, student and flag data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Walks a dotted path through nested objects.
    ///
    /// Returns `None` when any segment is missing or a non-object is
    /// traversed.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.0, |current, segment| current.as_object()?.get(segment))
    }

    fn flag(&self, name: &str) -> Option<&Value> {
        self.0.get("flags")?.as_object()?.get(name)
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Applies a mapping only when another snapshot field holds a given string.
#[derive(Debug, Clone, Copy)]
struct Guard {
    path: &'static str,
    equals: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SnapshotMapping {
    key: &'static str,
    path: &'static str,
    guard: Option<Guard>,
}

const STUDENT_ACTOR: Guard = Guard {
    path: "identity.actorType",
    equals: "student",
};

const fn field(key: &'static str, path: &'static str) -> SnapshotMapping {
    SnapshotMapping {
        key,
        path,
        guard: None,
    }
}

const fn guarded(key: &'static str, path: &'static str, guard: Guard) -> SnapshotMapping {
    SnapshotMapping {
        key,
        path,
        guard: Some(guard),
    }
}

static SNAPSHOT_MAPPINGS: &[SnapshotMapping] = &[
    // identity
    field("actor_type", "identity.actorType"),
    field("actor_id", "identity.actorId"),
    guarded("alumno_id", "identity.actorId", STUDENT_ACTOR),
    guarded("alumno_email", "identity.email", STUDENT_ACTOR),
    field("is_authenticated", "identity.isAuthenticated"),
    // environment
    field("app_env", "environment.env"),
    field("environment", "environment.context"),
    field("screen", "environment.screen"),
    field("editor", "environment.editor"),
    field("sidebar_context", "environment.sidebarContext"),
    field("navigation_zone", "environment.navigationZone"),
    // time
    field("time_now", "time.now"),
    field("day_key", "time.dayKey"),
    field("timestamp", "time.timestamp"),
    // student
    field("nivel_efectivo", "student.nivelEfectivo"),
    field("nivel_base", "student.nivelBase"),
    field("fase_efectiva", "student.faseEfectiva.id"),
    field("nombre_nivel", "student.nombreNivel"),
    field("tiene_overrides", "student.tieneOverrides"),
    field("streak", "student.streak"),
    field("today_practiced", "student.todayPracticed"),
    field("ultimo_dia_con_practica", "student.ultimoDiaConPractica"),
    field("congelada_por_pausa", "student.congeladaPorPausa"),
    field("dias_congelados", "student.diasCongelados"),
    field("suscripcion_pausada", "student.suscripcionPausada"),
    field("puede_practicar", "student.puedePracticar"),
];

/// A non-null value found in the snapshot, with the path it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHit {
    pub value: Value,
    pub path: String,
}

/// Returns the snapshot path a context key maps to, if any.
pub fn snapshot_path(key: &str) -> Option<String> {
    if let Some(name) = flag_name(key) {
        return Some(format!("flags.{name}"));
    }
    mapping_for(key).map(|m| m.path.to_string())
}

/// Whether the key has a snapshot mapping at all.
pub fn is_snapshot_key(key: &str) -> bool {
    flag_name(key).is_some() || mapping_for(key).is_some()
}

/// Looks up a context key in the snapshot.
///
/// Null values count as absent. A guarded mapping whose guard does not hold
/// yields nothing.
pub fn lookup(snapshot: &Snapshot, key: &str) -> Option<SnapshotHit> {
    if let Some(name) = flag_name(key) {
        return snapshot
            .flag(name)
            .filter(|v| !v.is_null())
            .map(|value| SnapshotHit {
                value: value.clone(),
                path: format!("flags.{name}"),
            });
    }

    let mapping = mapping_for(key)?;
    if let Some(guard) = mapping.guard {
        let holds = snapshot
            .get_path(guard.path)
            .and_then(Value::as_str)
            .is_some_and(|v| v == guard.equals);
        if !holds {
            return None;
        }
    }

    snapshot
        .get_path(mapping.path)
        .filter(|v| !v.is_null())
        .map(|value| SnapshotHit {
            value: value.clone(),
            path: mapping.path.to_string(),
        })
}

fn flag_name(key: &str) -> Option<&str> {
    key.strip_prefix(FLAG_PREFIX).filter(|name| !name.is_empty())
}

fn mapping_for(key: &str) -> Option<&'static SnapshotMapping> {
    SNAPSHOT_MAPPINGS.iter().find(|m| m.key == key)
}
