//! In-memory coordination service for testing and embedding.
//!
//! [`InMemoryCoordination`] keeps every node in a `BTreeMap` behind a
//! `RwLock`, so children come back in name order. It implements the full
//! [`CoordinationClient`] trait, including sequential nodes and parent
//! checks. [`InMemoryCoordination::expire`] simulates session loss.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use dlog_types::Versioned;

use crate::error::{CoordError, Result};
use crate::path;
use crate::traits::{CoordinationClient, CreateMode};

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    version: i64,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    sequences: HashMap<String, u64>,
}

/// An in-memory implementation of [`CoordinationClient`].
///
/// Only the root node exists initially. Data is lost when the store is
/// dropped.
#[derive(Debug)]
pub struct InMemoryCoordination {
    tree: RwLock<Tree>,
    expired: AtomicBool,
}

impl InMemoryCoordination {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                data: Vec::new(),
                version: 0,
            },
        );
        Self {
            tree: RwLock::new(Tree {
                nodes,
                sequences: HashMap::new(),
            }),
            expired: AtomicBool::new(false),
        }
    }

    /// Fail every later request with [`CoordError::Unavailable`].
    pub fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
        tracing::info!("coordination session expired");
    }

    /// Undo [`expire`](InMemoryCoordination::expire).
    pub fn reconnect(&self) {
        self.expired.store(false, Ordering::SeqCst);
    }

    /// Paths of every node, root included, in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.tree
            .read()
            .expect("coordination tree lock poisoned")
            .nodes
            .keys()
            .cloned()
            .collect()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tree>> {
        self.check_session()?;
        Ok(self.tree.read().expect("coordination tree lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tree>> {
        self.check_session()?;
        Ok(self.tree.write().expect("coordination tree lock poisoned"))
    }

    fn check_session(&self) -> Result<()> {
        if self.expired.load(Ordering::SeqCst) {
            return Err(CoordError::Unavailable("session expired".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryCoordination {
    fn default() -> Self {
        Self::new()
    }
}

fn check_version(path: &str, node: &Node, expected: Option<i64>) -> Result<()> {
    match expected {
        Some(expected) if expected != node.version => Err(CoordError::BadVersion {
            path: path.to_string(),
            expected,
            actual: node.version,
        }),
        _ => Ok(()),
    }
}

fn no_node(path: &str) -> CoordError {
    CoordError::NoNode {
        path: path.to_string(),
    }
}

fn children_of<'a>(tree: &'a Tree, parent: &'a str) -> impl Iterator<Item = &'a str> {
    let prefix = if parent == "/" {
        "/".to_string()
    } else {
        format!("{parent}/")
    };
    tree.nodes
        .range(prefix.clone()..)
        .take_while(move |(k, _)| k.starts_with(&prefix))
        .filter(|(k, _)| k.as_str() != "/")
        .map(|(k, _)| k.as_str())
        .filter(move |k| path::parent(k) == Some(parent))
}

#[async_trait]
impl CoordinationClient for InMemoryCoordination {
    async fn create(&self, node_path: &str, data: &[u8], mode: CreateMode) -> Result<String> {
        path::validate_path(node_path)?;
        let parent = path::parent(node_path).ok_or_else(|| CoordError::NodeExists {
            path: node_path.to_string(),
        })?;
        let mut tree = self.write()?;
        if !tree.nodes.contains_key(parent) {
            return Err(no_node(parent));
        }
        let actual = match mode {
            CreateMode::Persistent => node_path.to_string(),
            CreateMode::PersistentSequential => {
                let counter = tree.sequences.entry(parent.to_string()).or_default();
                let actual = format!("{node_path}{:010}", *counter);
                *counter += 1;
                actual
            }
        };
        if tree.nodes.contains_key(&actual) {
            return Err(CoordError::NodeExists { path: actual });
        }
        tree.nodes.insert(
            actual.clone(),
            Node {
                data: data.to_vec(),
                version: 0,
            },
        );
        Ok(actual)
    }

    async fn get_data(&self, node_path: &str) -> Result<Versioned<Vec<u8>>> {
        path::validate_path(node_path)?;
        let tree = self.read()?;
        let node = tree.nodes.get(node_path).ok_or_else(|| no_node(node_path))?;
        Ok(Versioned::new(node.data.clone(), Some(node.version)))
    }

    async fn set_data(
        &self,
        node_path: &str,
        data: &[u8],
        expected_version: Option<i64>,
    ) -> Result<i64> {
        path::validate_path(node_path)?;
        let mut tree = self.write()?;
        let node = tree
            .nodes
            .get_mut(node_path)
            .ok_or_else(|| no_node(node_path))?;
        check_version(node_path, node, expected_version)?;
        node.data = data.to_vec();
        node.version += 1;
        Ok(node.version)
    }

    async fn delete(&self, node_path: &str, expected_version: Option<i64>) -> Result<()> {
        path::validate_path(node_path)?;
        let mut tree = self.write()?;
        let node = tree.nodes.get(node_path).ok_or_else(|| no_node(node_path))?;
        check_version(node_path, node, expected_version)?;
        if node_path == "/" || children_of(&tree, node_path).next().is_some() {
            return Err(CoordError::NotEmpty {
                path: node_path.to_string(),
            });
        }
        tree.nodes.remove(node_path);
        tree.sequences.remove(node_path);
        Ok(())
    }

    async fn exists(&self, node_path: &str) -> Result<Option<i64>> {
        path::validate_path(node_path)?;
        let tree = self.read()?;
        Ok(tree.nodes.get(node_path).map(|n| n.version))
    }

    async fn get_children(&self, node_path: &str) -> Result<Vec<String>> {
        path::validate_path(node_path)?;
        let tree = self.read()?;
        if !tree.nodes.contains_key(node_path) {
            return Err(no_node(node_path));
        }
        Ok(children_of(&tree, node_path)
            .map(|child| path::name(child).to_string())
            .collect())
    }
}
