use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/* --------- Tipos de condición conocidos --------- */

pub const RUNNING: &str = "Running";
pub const SUCCEEDED: &str = "Succeeded";
pub const FAILED: &str = "Failed";
pub const CANCELED: &str = "Canceled";
pub const READY: &str = "Ready";

pub const TRUE: &str = "True";
pub const FALSE: &str = "False";

/// Severidad de una condición.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Critical,
    Error,
    Warn,
    Required,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub reason: String,
    pub category: Category,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub items: Vec<String>,
    /// Las condiciones durables sobreviven al final de un reconcile aunque
    /// nadie las vuelva a afirmar.
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Marca interna del ciclo begin/end staging. No se serializa.
    #[serde(skip)]
    pub staged: bool,
}

impl Condition {
    pub fn new(kind: &str, status: &str, category: Category) -> Self {
        Self {
            kind: kind.to_string(),
            status: status.to_string(),
            reason: String::new(),
            category,
            message: String::new(),
            items: Vec::new(),
            durable: false,
            last_transition_time: None,
            staged: true,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == TRUE
    }

    /// Igualdad ignorando el timestamp y la marca de staging.
    fn same_content(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.category == other.category
            && self.message == other.message
            && self.items == other.items
            && self.durable == other.durable
    }
}

/// Lista de condiciones con semántica de "set por tipo".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions {
    pub list: Vec<Condition>,
}

impl Conditions {
    pub fn find(&self, kind: &str) -> Option<&Condition> {
        self.list.iter().find(|c| c.kind == kind)
    }

    pub fn has(&self, kind: &str) -> bool {
        self.find(kind).is_some()
    }

    /// Inserta o reemplaza la condición del mismo tipo. Si el contenido no
    /// cambió se conserva el `last_transition_time` original.
    pub fn set(&mut self, mut condition: Condition, now: DateTime<Utc>) {
        condition.staged = true;
        match self.list.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) => {
                if existing.same_content(&condition) {
                    existing.staged = true;
                    return;
                }
                condition.last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time
                } else {
                    Some(now)
                };
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(now);
                self.list.push(condition);
            }
        }
    }

    pub fn delete(&mut self, kind: &str) {
        self.list.retain(|c| c.kind != kind);
    }

    /// Al empezar un reconcile: las condiciones no durables quedan pendientes
    /// de ser re-afirmadas.
    pub fn begin_staging(&mut self) {
        for c in self.list.iter_mut() {
            c.staged = c.durable;
        }
    }

    /// Al terminar: se descartan las no durables que nadie re-afirmó.
    pub fn end_staging(&mut self) {
        self.list.retain(|c| c.staged || c.durable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn set_reemplaza_por_tipo_sin_duplicar() {
        let mut conds = Conditions::default();
        conds.set(
            Condition::new(RUNNING, TRUE, Category::Advisory).message("Step 1 of 3"),
            ts(1),
        );
        conds.set(
            Condition::new(RUNNING, TRUE, Category::Advisory).message("Step 2 of 3"),
            ts(2),
        );

        assert_eq!(conds.list.len(), 1);
        let running = conds.find(RUNNING).unwrap();
        assert_eq!(running.message, "Step 2 of 3");
        // mismo status => se conserva el instante de transición original
        assert_eq!(running.last_transition_time, Some(ts(1)));
    }

    #[test]
    fn set_con_mismo_contenido_no_toca_el_timestamp() {
        let mut conds = Conditions::default();
        let c = Condition::new(FAILED, TRUE, Category::Warn).durable();
        conds.set(c.clone(), ts(10));
        conds.set(c, ts(20));
        assert_eq!(conds.find(FAILED).unwrap().last_transition_time, Some(ts(10)));
    }

    #[test]
    fn staging_descarta_no_durables_no_reafirmadas() {
        let mut conds = Conditions::default();
        conds.set(Condition::new(RUNNING, TRUE, Category::Advisory), ts(1));
        conds.set(Condition::new(FAILED, TRUE, Category::Warn).durable(), ts(1));

        conds.begin_staging();
        conds.end_staging();

        assert!(!conds.has(RUNNING));
        assert!(conds.has(FAILED));
    }

    #[test]
    fn staging_conserva_las_reafirmadas() {
        let mut conds = Conditions::default();
        conds.set(Condition::new(RUNNING, TRUE, Category::Advisory), ts(1));

        conds.begin_staging();
        conds.set(Condition::new(RUNNING, TRUE, Category::Advisory), ts(2));
        conds.end_staging();

        assert!(conds.has(RUNNING));
    }

    #[test]
    fn serializa_el_tipo_como_type() {
        let c = Condition::new(SUCCEEDED, TRUE, Category::Advisory);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "Succeeded");
        assert!(v.get("staged").is_none());
    }
}
