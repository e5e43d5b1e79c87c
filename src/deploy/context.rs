// ABOUTME: Deployment context tree: top-level units, their children and components.
// ABOUTME: One node type with a kind discriminator; handles are cheap to clone.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::{DeploymentError, DeploymentState};
use crate::controller::DependencyItem;
use crate::types::{AttachmentKey, Attachments};

/// Where a node sits in its deployment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Independently deployable root.
    TopLevel,
    /// Independently named sub-deployment, such as a nested module.
    Child,
    /// Scoped under its parent, never deployed on its own.
    Component,
}

struct Node {
    name: String,
    kind: ContextKind,
    parent: Option<Weak<Node>>,
    data: RwLock<NodeData>,
}

#[derive(Default)]
struct NodeData {
    state: DeploymentState,
    problem: Option<Arc<DeploymentError>>,
    children: Vec<DeploymentContext>,
    components: Vec<DeploymentContext>,
    attachments: Attachments,
    dependencies: Vec<DependencyItem>,
    controller_names: Vec<String>,
}

/// Handle to one node of a deployment tree.
///
/// Clones share the node. Equality is identity.
#[derive(Clone)]
pub struct DeploymentContext {
    node: Arc<Node>,
}

impl PartialEq for DeploymentContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for DeploymentContext {}

impl std::fmt::Debug for DeploymentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.node.data.read();
        f.debug_struct("DeploymentContext")
            .field("name", &self.node.name)
            .field("kind", &self.node.kind)
            .field("state", &data.state)
            .field("children", &data.children.len())
            .field("components", &data.components.len())
            .finish()
    }
}

impl DeploymentContext {
    /// Create a new top-level deployment.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), ContextKind::TopLevel, None)
    }

    fn with_kind(name: String, kind: ContextKind, parent: Option<Weak<Node>>) -> Self {
        Self {
            node: Arc::new(Node {
                name,
                kind,
                parent,
                data: RwLock::new(NodeData::default()),
            }),
        }
    }

    /// Append a child sub-deployment and return it.
    pub fn add_child(&self, name: impl Into<String>) -> DeploymentContext {
        let child = Self::with_kind(
            name.into(),
            ContextKind::Child,
            Some(Arc::downgrade(&self.node)),
        );
        self.node.data.write().children.push(child.clone());
        child
    }

    /// Append a component and return it.
    pub fn add_component(&self, name: impl Into<String>) -> DeploymentContext {
        let component = Self::with_kind(
            name.into(),
            ContextKind::Component,
            Some(Arc::downgrade(&self.node)),
        );
        self.node.data.write().components.push(component.clone());
        component
    }

    /// Detach a component by name. Returns whether one was removed.
    pub fn remove_component(&self, name: &str) -> bool {
        let mut data = self.node.data.write();
        let before = data.components.len();
        data.components.retain(|c| c.name() != name);
        data.components.len() != before
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn kind(&self) -> ContextKind {
        self.node.kind
    }

    pub fn is_top_level(&self) -> bool {
        self.node.kind == ContextKind::TopLevel
    }

    pub fn is_component(&self) -> bool {
        self.node.kind == ContextKind::Component
    }

    pub fn parent(&self) -> Option<DeploymentContext> {
        let parent = self.node.parent.as_ref()?.upgrade()?;
        Some(DeploymentContext { node: parent })
    }

    /// The top-level deployment this node belongs to.
    pub fn top_level(&self) -> DeploymentContext {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn state(&self) -> DeploymentState {
        self.node.data.read().state
    }

    pub fn set_state(&self, state: DeploymentState) {
        self.node.data.write().state = state;
    }

    pub fn problem(&self) -> Option<Arc<DeploymentError>> {
        self.node.data.read().problem.clone()
    }

    pub fn set_problem(&self, problem: Option<Arc<DeploymentError>>) {
        self.node.data.write().problem = problem;
    }

    /// Mark this node failed with `problem`.
    pub fn mark_error(&self, problem: Arc<DeploymentError>) {
        let mut data = self.node.data.write();
        data.state = DeploymentState::Error;
        data.problem = Some(problem);
    }

    /// Snapshot of the children, in order.
    pub fn children(&self) -> Vec<DeploymentContext> {
        self.node.data.read().children.clone()
    }

    /// Snapshot of the components, in order.
    pub fn components(&self) -> Vec<DeploymentContext> {
        self.node.data.read().components.clone()
    }

    /// This node followed by every descendant, children before components.
    pub fn depth_first(&self) -> Vec<DeploymentContext> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let (children, components) = {
                let data = node.node.data.read();
                (data.children.clone(), data.components.clone())
            };
            out.push(node);
            stack.extend(components.into_iter().rev());
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Set the state of this node and every descendant.
    pub fn set_state_recursive(&self, state: DeploymentState) {
        for node in self.depth_first() {
            node.set_state(state);
        }
    }

    /// Forget every fault recorded in the subtree.
    pub fn clear_problems(&self) {
        for node in self.depth_first() {
            node.set_problem(None);
        }
    }

    /// Move every node of the subtree currently in `from` to `to`.
    pub fn set_state_if(&self, from: DeploymentState, to: DeploymentState) {
        for node in self.depth_first() {
            let mut data = node.node.data.write();
            if data.state == from {
                data.state = to;
            }
        }
    }

    pub fn attach<T: Any + Send + Sync>(&self, key: &AttachmentKey<T>, value: T) {
        self.node.data.write().attachments.insert(key, value);
    }

    pub fn attach_marker(&self, name: impl Into<String>) {
        self.node.data.write().attachments.insert_marker(name);
    }

    /// Declare an attachment that outlives undeploy.
    pub fn predetermine<T: Any + Send + Sync>(&self, key: &AttachmentKey<T>, value: T) {
        self.node.data.write().attachments.insert_predetermined(key, value);
    }

    pub fn predetermine_marker(&self, name: impl Into<String>) {
        self.node
            .data
            .write()
            .attachments
            .insert_predetermined_marker(name);
    }

    pub fn attachment<T: Any + Send + Sync>(&self, key: &AttachmentKey<T>) -> Option<Arc<T>> {
        self.node.data.read().attachments.get(key)
    }

    pub fn has_attachment(&self, name: &str) -> bool {
        self.node.data.read().attachments.contains(name)
    }

    pub fn remove_attachment(&self, name: &str) -> bool {
        self.node.data.write().attachments.remove(name)
    }

    pub fn attachment_names(&self) -> Vec<String> {
        self.node.data.read().attachments.names()
    }

    /// Declare a dependency carried into this unit's controller context.
    pub fn add_dependency(&self, item: DependencyItem) {
        self.node.data.write().dependencies.push(item);
    }

    pub fn dependencies(&self) -> Vec<DependencyItem> {
        self.node.data.read().dependencies.clone()
    }

    /// Name an additional controller context that belongs to this unit.
    pub fn add_controller_name(&self, name: impl Into<String>) {
        self.node.data.write().controller_names.push(name.into());
    }

    pub fn controller_names(&self) -> Vec<String> {
        self.node.data.read().controller_names.clone()
    }

    /// Drop what deployers attached across the subtree.
    pub fn cleanup(&self) {
        for node in self.depth_first() {
            node.node.data.write().attachments.clear_transient();
        }
    }

    /// Forget the structure built for this unit: children, components,
    /// dependencies, controller names and produced attachments. Predetermined
    /// attachments stay.
    pub fn reset_structure(&self) {
        let mut data = self.node.data.write();
        data.children.clear();
        data.components.clear();
        data.dependencies.clear();
        data.controller_names.clear();
        data.attachments.clear_transient();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DeploymentContext {
        let ear = DeploymentContext::new("app.ear");
        let war = ear.add_child("web.war");
        war.add_component("servlet");
        ear.add_child("ejb.jar");
        ear.add_component("ear-bean");
        ear
    }

    #[test]
    fn kinds_follow_construction() {
        let ear = tree();
        assert!(ear.is_top_level());
        let war = &ear.children()[0];
        assert_eq!(war.kind(), ContextKind::Child);
        assert!(!war.is_top_level());
        assert!(war.components()[0].is_component());
        assert_eq!(war.components()[0].top_level(), ear);
    }

    #[test]
    fn depth_first_visits_children_before_components() {
        let names: Vec<String> = tree()
            .depth_first()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["app.ear", "web.war", "servlet", "ejb.jar", "ear-bean"]
        );
    }

    #[test]
    fn set_state_if_only_touches_matching_nodes() {
        let ear = tree();
        ear.set_state_recursive(DeploymentState::Deploying);
        ear.children()[1].mark_error(Arc::new(DeploymentError::message("bad")));

        ear.set_state_if(DeploymentState::Deploying, DeploymentState::Undeployed);

        assert_eq!(ear.state(), DeploymentState::Undeployed);
        assert_eq!(ear.children()[0].state(), DeploymentState::Undeployed);
        assert_eq!(ear.children()[1].state(), DeploymentState::Error);
    }

    #[test]
    fn cleanup_clears_transient_attachments_recursively() {
        let ear = tree();
        ear.predetermine_marker("application.xml");
        ear.attach_marker("classloader");
        ear.children()[0].attach_marker("web-metadata");

        ear.cleanup();

        assert!(ear.has_attachment("application.xml"));
        assert!(!ear.has_attachment("classloader"));
        assert!(!ear.children()[0].has_attachment("web-metadata"));
    }

    #[test]
    fn reset_structure_empties_the_unit() {
        let ear = tree();
        ear.predetermine_marker("application.xml");
        ear.attach_marker("classloader");
        ear.add_controller_name("app.ear/extra");
        ear.add_dependency(DependencyItem::new(
            "app.ear",
            "lib.jar",
            "Real".into(),
            "Installed".into(),
        ));

        ear.reset_structure();

        assert!(ear.children().is_empty());
        assert!(ear.components().is_empty());
        assert!(ear.dependencies().is_empty());
        assert!(ear.controller_names().is_empty());
        assert_eq!(ear.attachment_names(), ["application.xml"]);
    }

    #[test]
    fn equality_is_identity() {
        let a = DeploymentContext::new("same");
        let b = DeploymentContext::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
