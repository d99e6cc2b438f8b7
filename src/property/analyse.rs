//! Schema analysis: decorating every define with its resolved path and
//! collecting the default value tree.

use super::getter::GetterRunner;
use super::path::{resolve_path, PathSegment};
use super::schema::{Ctrl, PropertyDefine};
use super::values::write_back;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A define annotated for one analysis pass.
#[derive(Debug, Clone)]
pub struct DecoratedNode {
    /// Fresh id for this pass; used as the UI identity of the control
    pub id: Uuid,
    /// The define itself
    pub ctrl: PropertyDefine,
    /// Ancestors from the schema root down to the parent
    pub parents: Vec<PathSegment>,
    /// Resolved write-back path
    pub path: Vec<PathSegment>,
    /// Decorated children (or List template)
    pub children: Vec<DecoratedNode>,
}

impl DecoratedNode {
    fn visit<'a>(&'a self, out: &mut Vec<&'a DecoratedNode>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

/// Result of [`analyse`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Decorated tree in schema order
    pub decorated: Vec<DecoratedNode>,
    /// Default value tree assembled from every `default` param
    pub defaults: Value,
}

impl Analysis {
    /// Every decorated node, parents before children.
    pub fn flatten(&self) -> Vec<&DecoratedNode> {
        let mut out = Vec::new();
        for node in &self.decorated {
            node.visit(&mut out);
        }
        out
    }

    /// Looks a decorated node up by id.
    pub fn find(&self, id: Uuid) -> Option<&DecoratedNode> {
        self.flatten().into_iter().find(|node| node.id == id)
    }
}

/// Analyses `schema` with no injected context.
pub fn analyse(schema: &[PropertyDefine]) -> Analysis {
    analyse_with(schema, &mut GetterRunner::new(), &Value::Object(Map::new()))
}

/// Analyses `schema`, evaluating default getters with `runner`.
///
/// Getters receive the defaults gathered so far as their `values` argument.
/// Defines are visited parents first, siblings in schema order, so a later
/// define writing the same path wins. List templates are decorated but their
/// defaults are not collected: they only seed rows added later.
pub fn analyse_with(schema: &[PropertyDefine], runner: &mut GetterRunner, injects: &Value) -> Analysis {
    let mut defaults = Value::Object(Map::new());
    let mut analyser = Analyser { runner, injects };
    let decorated = analyser.decorate(schema, &[], Some(&mut defaults));
    Analysis { decorated, defaults }
}

struct Analyser<'a> {
    runner: &'a mut GetterRunner,
    injects: &'a Value,
}

impl Analyser<'_> {
    fn decorate(
        &mut self,
        defines: &[PropertyDefine],
        parents: &[PathSegment],
        mut defaults: Option<&mut Value>,
    ) -> Vec<DecoratedNode> {
        let mut decorated = Vec::with_capacity(defines.len());
        for define in defines {
            let mut chain = parents.to_vec();
            chain.push(PathSegment::from(define));
            let path = resolve_path(&chain);

            if let Some(defaults) = defaults.as_deref_mut() {
                let default = define
                    .ctrl
                    .default_param()
                    .and_then(|param| self.runner.run(param, define, defaults, self.injects));
                *defaults = write_back(&path, default, defaults);
            }

            let children = match &define.ctrl {
                Ctrl::List { template, .. } => self.decorate(template, &chain, None),
                ctrl => self.decorate(ctrl.children(), &chain, defaults.as_deref_mut()),
            };

            decorated.push(DecoratedNode {
                id: Uuid::new_v4(),
                ctrl: define.clone(),
                parents: parents.to_vec(),
                path,
                children,
            });
        }
        decorated
    }
}
