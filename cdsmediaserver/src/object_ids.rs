//! Registre des ObjectID UPnP.
//!
//! Associe chaque chemin virtuel à un identifiant numérique, attribué à la
//! première rencontre et jamais réutilisé pendant la vie du processus.
//! `"0"` est réservé à la racine `/`, `"-1"` désigne "aucun objet".

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::errors::{ContentDirectoryError, Result};

pub const ROOT_ID: &str = "0";
pub const NO_OBJECT_ID: &str = "-1";
pub const ROOT_PATH: &str = "/";

#[derive(Debug)]
struct Table {
    /// Index 0 reste vide : les identifiants commencent à 1.
    paths: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Table {
    fn new() -> Self {
        Self {
            paths: vec![String::new()],
            ids: HashMap::new(),
        }
    }
}

/// Table append-only chemin <-> ObjectID
#[derive(Debug)]
pub struct IdentifierRegistry {
    table: Mutex<Table>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
        }
    }

    /// Identifiant de `path`.
    ///
    /// Avec `create == false`, simple recherche : `None` si le chemin n'a
    /// jamais été vu. Avec `create == true`, le résultat est toujours `Some`.
    pub fn to_id(&self, path: &str, create: bool) -> Option<String> {
        match path {
            ROOT_PATH => return Some(ROOT_ID.to_string()),
            "" => return Some(NO_OBJECT_ID.to_string()),
            _ => {}
        }

        let mut table = self.table.lock();
        if let Some(id) = table.ids.get(path) {
            return Some(id.to_string());
        }
        if !create {
            return None;
        }

        let id = table.paths.len();
        table.paths.push(path.to_string());
        table.ids.insert(path.to_string(), id);
        Some(id.to_string())
    }

    /// Identifiant de `path`, créé si nécessaire.
    pub fn intern(&self, path: &str) -> String {
        self.to_id(path, true).unwrap_or_default()
    }

    /// Chemin associé à `id`.
    pub fn from_id(&self, id: &str) -> Result<String> {
        if id == ROOT_ID {
            return Ok(ROOT_PATH.to_string());
        }

        let not_found = || ContentDirectoryError::NotFound(id.to_string());
        let index: usize = id.parse().map_err(|_| not_found())?;
        // une seule écriture par id : pas de "01" ni de "+1"
        if index.to_string() != id {
            return Err(not_found());
        }

        let table = self.table.lock();
        match table.paths.get(index) {
            Some(path) if index > 0 => Ok(path.clone()),
            _ => Err(not_found()),
        }
    }

    /// Nombre d'objets enregistrés, racine exclue
    pub fn len(&self) -> usize {
        self.table.lock().paths.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oublie tous les identifiants (arrêt du service)
    pub fn clear(&self) {
        *self.table.lock() = Table::new();
    }
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
