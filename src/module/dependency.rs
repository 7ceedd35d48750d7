//! 模块依赖管理
//!
//! 本模块根据一组模块清单构建依赖图，校验后给出确定性的激活顺序。
//!
//! # 主要组件
//!
//! - [`DependencyGraph`] - 依赖关系图，负责校验与拓扑排序
//! - [`ActivationOrder`] - 激活顺序：每条依赖边 `A -> B` 都保证 B 在 A 之前
//! - [`GraphError`] - 一次性汇总的全部校验问题
//!
//! # 解析规则
//!
//! - 必需依赖指向未注册的模块：`MissingDependency`
//! - 目标版本低于声明的最低版本：`VersionTooLow`
//! - 三色深度优先遍历发现回边：`CircularDependency`，附带完整环路
//! - 可选依赖指向未注册的模块：从图中剪除，只记录日志
//!
//! 所有问题收集完毕后一起返回，不会在第一个问题处中止。
//!
//! # 示例
//!
//! ```rust
//! use chips_orchestrator::module::dependency::DependencyGraph;
//! use chips_orchestrator::module::manifest::{Dependency, Manifest};
//! use chips_orchestrator::module::version::VersionSpec;
//!
//! let core = Manifest::new("core", "Core", VersionSpec::new(1, 0, 0));
//! let mail = Manifest::new("mail", "Mail", VersionSpec::new(1, 0, 0))
//!     .with_dependency(Dependency::required("core"));
//!
//! let mut graph = DependencyGraph::build(&[mail, core]);
//! let order = graph.activation_order().unwrap();
//! assert_eq!(order.as_slice(), &["core".to_string(), "mail".to_string()]);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::manifest::Manifest;
use super::version::VersionSpec;
use crate::utils::Result;

// ============================================================================
// 激活顺序
// ============================================================================

/// 模块激活顺序
///
/// 每个模块 ID 至多出现一次；对任意依赖边 `A -> B`，B 排在 A 之前。
/// 在一次编排过程中只读。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationOrder(Vec<String>);

impl ActivationOrder {
    /// 由模块 ID 列表构造
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    /// 激活顺序切片
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// 按激活顺序遍历
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &String> {
        self.0.iter()
    }

    /// 按拆除顺序（激活顺序的反序）遍历
    pub fn teardown(&self) -> impl Iterator<Item = &String> {
        self.0.iter().rev()
    }

    /// 模块在顺序中的位置
    pub fn position(&self, module_id: &str) -> Option<usize> {
        self.0.iter().position(|id| id == module_id)
    }

    /// 是否包含模块
    pub fn contains(&self, module_id: &str) -> bool {
        self.position(module_id).is_some()
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 取出内部列表
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ActivationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

// ============================================================================
// 校验问题
// ============================================================================

/// 依赖图中的单个问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    /// 必需依赖未注册
    MissingDependency {
        /// 依赖方
        dependent: String,
        /// 缺失的模块
        missing: String,
    },

    /// 依赖目标版本过低
    VersionTooLow {
        /// 依赖方
        dependent: String,
        /// 被依赖方
        target: String,
        /// 要求的最低版本
        required: VersionSpec,
        /// 实际版本
        actual: VersionSpec,
    },

    /// 循环依赖
    ///
    /// `path` 从重新进入的模块开始，按依赖边顺序列出环上的每个模块，
    /// 最后一个模块依赖第一个。
    CircularDependency {
        /// 环路
        path: Vec<String>,
    },

    /// 模块 ID 重复注册
    DuplicateModule {
        /// 重复的模块 ID
        id: String,
    },
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::MissingDependency { dependent, missing } => {
                write!(f, "模块 '{}' 的必需依赖 '{}' 未注册", dependent, missing)
            }
            GraphIssue::VersionTooLow {
                dependent,
                target,
                required,
                actual,
            } => write!(
                f,
                "模块 '{}' 要求 '{}' 版本不低于 {}，实际为 {}",
                dependent, target, required, actual
            ),
            GraphIssue::CircularDependency { path } => {
                let mut cycle = path.clone();
                if let Some(first) = path.first() {
                    cycle.push(first.clone());
                }
                write!(f, "检测到循环依赖: {}", cycle.join(" -> "))
            }
            GraphIssue::DuplicateModule { id } => write!(f, "模块 '{}' 重复注册", id),
        }
    }
}

/// 依赖图校验错误（包含全部问题）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphError {
    issues: Vec<GraphIssue>,
}

impl GraphError {
    /// 由问题列表创建
    pub fn new(issues: Vec<GraphIssue>) -> Self {
        Self { issues }
    }

    /// 全部问题
    pub fn issues(&self) -> &[GraphIssue] {
        &self.issues
    }

    /// 问题数量
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// 是否没有问题
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// 所有环路
    pub fn cycles(&self) -> impl Iterator<Item = &[String]> {
        self.issues.iter().filter_map(|issue| match issue {
            GraphIssue::CircularDependency { path } => Some(path.as_slice()),
            _ => None,
        })
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "共 {} 个问题", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphError {}

// ============================================================================
// 依赖图
// ============================================================================

/// 遍历状态（三色标记）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitState {
    /// 未访问
    #[default]
    Unvisited,
    /// 正在访问（在当前遍历栈上）
    Visiting,
    /// 已访问完成
    Visited,
}

/// 图节点：清单 + 仅在解析期间使用的遍历状态
#[derive(Debug, Clone)]
pub struct GraphNode {
    manifest: Manifest,
    state: VisitState,
    /// 已解析的依赖边（按声明顺序，存放目标节点下标）
    edges: Vec<usize>,
}

impl GraphNode {
    /// 节点对应的清单
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 当前遍历状态
    pub fn state(&self) -> VisitState {
        self.state
    }
}

/// 解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// 完整校验并按拓扑排序
    #[default]
    Validated,
    /// 关闭依赖解析：原样返回注册顺序，不做任何图分析
    RegistrationOrder,
}

impl ResolutionMode {
    /// 根据配置开关选择模式
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            ResolutionMode::Validated
        } else {
            ResolutionMode::RegistrationOrder
        }
    }
}

/// 模块依赖关系图
///
/// 节点按注册顺序存放，平局时以注册顺序决定先后，保证同样的输入得到同样的激活顺序。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    /// 构建阶段发现的问题（重复、缺失、版本）
    issues: Vec<GraphIssue>,
    /// 被剪除的可选依赖：(依赖方, 缺失目标)
    pruned: Vec<(String, String)>,
}

impl DependencyGraph {
    /// 根据清单列表构建依赖图
    ///
    /// 构建时即完成缺失依赖与版本检查，环路检查在 [`activation_order`](Self::activation_order) 中进行。
    pub fn build(manifests: &[Manifest]) -> Self {
        let mut graph = Self::default();

        for manifest in manifests {
            if graph.index.contains_key(&manifest.id) {
                warn!(module_id = %manifest.id, "模块重复注册，忽略后一个清单");
                graph.issues.push(GraphIssue::DuplicateModule {
                    id: manifest.id.clone(),
                });
                continue;
            }
            graph.index.insert(manifest.id.clone(), graph.nodes.len());
            graph.nodes.push(GraphNode {
                manifest: manifest.clone(),
                state: VisitState::Unvisited,
                edges: Vec::new(),
            });
        }

        for i in 0..graph.nodes.len() {
            let mut edges = Vec::new();
            let manifest = &graph.nodes[i].manifest;

            for dep in &manifest.dependencies {
                match graph.index.get(&dep.target_id) {
                    Some(&target) => {
                        let actual = graph.nodes[target].manifest.version;
                        if let Some(required) = dep.min_version {
                            if !actual.satisfies_min(&required) {
                                graph.issues.push(GraphIssue::VersionTooLow {
                                    dependent: manifest.id.clone(),
                                    target: dep.target_id.clone(),
                                    required,
                                    actual,
                                });
                            }
                        }
                        if !edges.contains(&target) {
                            edges.push(target);
                        }
                    }
                    None if dep.optional => {
                        info!(
                            module_id = %manifest.id,
                            dependency = %dep.target_id,
                            "可选依赖未注册，已从依赖图中剪除"
                        );
                        graph.pruned.push((manifest.id.clone(), dep.target_id.clone()));
                    }
                    None => {
                        graph.issues.push(GraphIssue::MissingDependency {
                            dependent: manifest.id.clone(),
                            missing: dep.target_id.clone(),
                        });
                    }
                }
            }

            graph.nodes[i].edges = edges;
        }

        graph
    }

    /// 计算激活顺序
    ///
    /// 对每个未访问节点（按注册顺序）做三色深度优先遍历，后序输出即为激活顺序。
    /// 进入一个 `Visiting` 状态的节点意味着存在环，记录从该节点开始的完整环路后继续遍历，
    /// 以便一次性报告全部环路。
    ///
    /// # 错误
    ///
    /// 存在任何问题（包括构建阶段发现的问题）时返回包含全部问题的 [`GraphError`]。
    pub fn activation_order(&mut self) -> std::result::Result<ActivationOrder, GraphError> {
        for node in &mut self.nodes {
            node.state = VisitState::Unvisited;
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut cycles = Vec::new();

        for i in 0..self.nodes.len() {
            if self.nodes[i].state == VisitState::Unvisited {
                self.visit(i, &mut order, &mut cycles);
            }
        }

        let mut issues = self.issues.clone();
        issues.extend(cycles);

        if issues.is_empty() {
            let order = ActivationOrder::new(
                order
                    .into_iter()
                    .map(|i| self.nodes[i].manifest.id.clone())
                    .collect(),
            );
            debug!(order = %order, "激活顺序已确定");
            Ok(order)
        } else {
            warn!(count = issues.len(), "依赖图校验失败");
            Err(GraphError::new(issues))
        }
    }

    /// 从 `root` 出发的三色遍历
    ///
    /// 以显式栈代替递归，`frames` 中的节点序列就是当前路径，深链不会耗尽线程栈。
    fn visit(&mut self, root: usize, order: &mut Vec<usize>, cycles: &mut Vec<GraphIssue>) {
        // (节点, 下一条待处理边的下标)
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        self.nodes[root].state = VisitState::Visiting;

        while let Some(frame) = frames.last_mut() {
            let (node, k) = *frame;

            let Some(&next) = self.nodes[node].edges.get(k) else {
                frames.pop();
                self.nodes[node].state = VisitState::Visited;
                order.push(node);
                continue;
            };
            frame.1 += 1;

            match self.nodes[next].state {
                VisitState::Unvisited => {
                    self.nodes[next].state = VisitState::Visiting;
                    frames.push((next, 0));
                }
                VisitState::Visiting => {
                    // next 一定在路径上
                    if let Some(start) = frames.iter().position(|&(n, _)| n == next) {
                        let path = frames[start..]
                            .iter()
                            .map(|&(n, _)| self.nodes[n].manifest.id.clone())
                            .collect();
                        cycles.push(GraphIssue::CircularDependency { path });
                    }
                }
                VisitState::Visited => {}
            }
        }
    }

    /// 构建阶段发现的问题（不含环路）
    pub fn issues(&self) -> &[GraphIssue] {
        &self.issues
    }

    /// 被剪除的可选依赖
    pub fn pruned_optional(&self) -> &[(String, String)] {
        &self.pruned
    }

    /// 获取节点
    pub fn node(&self, module_id: &str) -> Option<&GraphNode> {
        self.index.get(module_id).map(|&i| &self.nodes[i])
    }

    /// 获取模块的直接依赖（只含图中存在的模块）
    pub fn get_dependencies(&self, module_id: &str) -> Vec<String> {
        self.node(module_id)
            .map(|node| {
                node.edges
                    .iter()
                    .map(|&i| self.nodes[i].manifest.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 获取直接依赖该模块的模块（按注册顺序）
    pub fn get_dependents(&self, module_id: &str) -> Vec<String> {
        let Some(&target) = self.index.get(module_id) else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .filter(|node| node.edges.contains(&target))
            .map(|node| node.manifest.id.clone())
            .collect()
    }

    /// 获取模块的所有传递依赖
    pub fn get_all_dependencies(&self, module_id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        if let Some(&start) = self.index.get(module_id) {
            visited.insert(start);
            self.collect_dependencies(start, &mut result, &mut visited);
        }
        result
    }

    fn collect_dependencies(&self, root: usize, result: &mut Vec<String>, visited: &mut HashSet<usize>) {
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let (node, k) = *frame;
            let Some(&dep) = self.nodes[node].edges.get(k) else {
                frames.pop();
                if node != root {
                    result.push(self.nodes[node].manifest.id.clone());
                }
                continue;
            };
            frame.1 += 1;

            if visited.insert(dep) {
                frames.push((dep, 0));
            }
        }
    }

    /// 是否包含指定模块
    pub fn contains_module(&self, module_id: &str) -> bool {
        self.index.contains_key(module_id)
    }

    /// 模块数量
    pub fn module_count(&self) -> usize {
        self.nodes.len()
    }

    /// 图是否为空
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// 解析一组清单的激活顺序
///
/// - [`ResolutionMode::Validated`]：构建依赖图并校验，返回拓扑顺序或全部问题
/// - [`ResolutionMode::RegistrationOrder`]：依赖解析关闭，原样返回注册顺序
pub fn resolve(manifests: &[Manifest], mode: ResolutionMode) -> Result<ActivationOrder> {
    match mode {
        ResolutionMode::RegistrationOrder => {
            info!(count = manifests.len(), "依赖解析已关闭，按注册顺序激活");
            Ok(ActivationOrder::new(
                manifests.iter().map(|m| m.id.clone()).collect(),
            ))
        }
        ResolutionMode::Validated => {
            let mut graph = DependencyGraph::build(manifests);
            let order = graph.activation_order()?;
            info!(count = order.len(), "依赖解析完成");
            Ok(order)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::manifest::Dependency;
    use crate::utils::CoreError;

    fn v(text: &str) -> VersionSpec {
        VersionSpec::parse(text).unwrap()
    }

    /// 创建测试用清单：deps 中的每一项都是必需依赖
    fn module(id: &str, deps: &[&str]) -> Manifest {
        deps.iter().fold(Manifest::new(id, id, v("1.0.0")), |m, dep| {
            m.with_dependency(Dependency::required(*dep))
        })
    }

    fn assert_before(order: &ActivationOrder, first: &str, second: &str) {
        let a = order.position(first).unwrap();
        let b = order.position(second).unwrap();
        assert!(a < b, "{} 应在 {} 之前: {}", first, second, order);
    }

    // ==================== 激活顺序 ====================

    #[test]
    fn test_simple_chain() {
        let manifests = vec![
            module("app", &["service"]),
            module("service", &["database"]),
            module("database", &[]),
        ];
        let order = resolve(&manifests, ResolutionMode::Validated).unwrap();

        assert_eq!(order.as_slice(), &["database", "service", "app"]);
    }

    #[test]
    fn test_diamond() {
        //     app
        //    /   \
        //   a     b
        //    \   /
        //      c
        //      |
        //      d
        let manifests = vec![
            module("app", &["a", "b"]),
            module("a", &["c"]),
            module("b", &["c"]),
            module("c", &["d"]),
            module("d", &[]),
        ];
        let order = resolve(&manifests, ResolutionMode::Validated).unwrap();

        assert_eq!(order.len(), 5);
        assert_before(&order, "d", "c");
        assert_before(&order, "c", "a");
        assert_before(&order, "c", "b");
        assert_before(&order, "a", "app");
        assert_before(&order, "b", "app");
    }

    #[test]
    fn test_independent_modules_keep_registration_order() {
        let manifests = vec![module("x", &[]), module("y", &[]), module("z", &[])];
        let order = resolve(&manifests, ResolutionMode::Validated).unwrap();
        assert_eq!(order.as_slice(), &["x", "y", "z"]);
    }

    #[test]
    fn test_order_is_stable_across_runs() {
        let manifests = vec![
            module("ui", &["mail", "calendar"]),
            module("calendar", &["core"]),
            module("mail", &["core"]),
            module("core", &[]),
        ];
        let first = resolve(&manifests, ResolutionMode::Validated).unwrap();
        for _ in 0..10 {
            assert_eq!(resolve(&manifests, ResolutionMode::Validated).unwrap(), first);
        }
        assert_eq!(first.as_slice(), &["core", "mail", "calendar", "ui"]);
    }

    #[test]
    fn test_every_edge_respected() {
        let manifests = vec![
            module("m5", &["m3", "m4"]),
            module("m1", &[]),
            module("m4", &["m1", "m2"]),
            module("m2", &["m1"]),
            module("m3", &["m2"]),
        ];
        let order = resolve(&manifests, ResolutionMode::Validated).unwrap();

        for manifest in &manifests {
            for dep in &manifest.dependencies {
                assert_before(&order, &dep.target_id, &manifest.id);
            }
        }
    }

    #[test]
    fn test_teardown_is_reverse() {
        let manifests = vec![module("mail", &["core"]), module("core", &[])];
        let order = resolve(&manifests, ResolutionMode::Validated).unwrap();
        let teardown: Vec<&String> = order.teardown().collect();
        assert_eq!(teardown, vec!["mail", "core"]);
    }

    // ==================== 环路 ====================

    #[test]
    fn test_cycle_reports_full_path() {
        let manifests = vec![module("a", &["b"]), module("b", &["c"]), module("c", &["a"])];
        let err = DependencyGraph::build(&manifests).activation_order().unwrap_err();

        let cycles: Vec<&[String]> = err.cycles().collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], &["a", "b", "c"]);
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_cycle_not_through_start_node() {
        let manifests = vec![
            module("app", &["x"]),
            module("x", &["y"]),
            module("y", &["x"]),
        ];
        let err = DependencyGraph::build(&manifests).activation_order().unwrap_err();
        let cycles: Vec<&[String]> = err.cycles().collect();
        assert_eq!(cycles, vec![&["x".to_string(), "y".to_string()][..]]);
    }

    #[test]
    fn test_multiple_cycles_all_reported() {
        let manifests = vec![
            module("a", &["b"]),
            module("b", &["a"]),
            module("c", &["d"]),
            module("d", &["c"]),
        ];
        let err = DependencyGraph::build(&manifests).activation_order().unwrap_err();
        assert_eq!(err.cycles().count(), 2);
    }

    // ==================== 缺失与版本 ====================

    #[test]
    fn test_missing_required_dependency() {
        let manifests = vec![module("mail", &["core"])];
        let err = DependencyGraph::build(&manifests).activation_order().unwrap_err();

        assert_eq!(
            err.issues(),
            &[GraphIssue::MissingDependency {
                dependent: "mail".to_string(),
                missing: "core".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_optional_dependency_is_pruned() {
        let mail = Manifest::new("mail", "Mail", v("1.0.0"))
            .with_dependency(Dependency::optional("spellcheck"));
        let mut graph = DependencyGraph::build(&[mail]);
        let order = graph.activation_order().unwrap();

        assert_eq!(order.as_slice(), &["mail"]);
        assert_eq!(
            graph.pruned_optional(),
            &[("mail".to_string(), "spellcheck".to_string())]
        );
        assert!(graph.get_dependencies("mail").is_empty());
    }

    #[test]
    fn test_present_optional_dependency_orders() {
        let mail = Manifest::new("mail", "Mail", v("1.0.0"))
            .with_dependency(Dependency::optional("spellcheck"));
        let spellcheck = module("spellcheck", &[]);
        let order = resolve(&[mail, spellcheck], ResolutionMode::Validated).unwrap();
        assert_before(&order, "spellcheck", "mail");
    }

    #[test]
    fn test_version_too_low() {
        let a = Manifest::new("a", "A", v("1.0.0"))
            .with_dependency(Dependency::required("b").at_least(v("2.0.0")));

        let err = resolve(&[a.clone(), Manifest::new("b", "B", v("1.9.5"))], ResolutionMode::Validated)
            .unwrap_err();
        let CoreError::DependencyResolution(graph_err) = err else {
            panic!("expected DependencyResolution");
        };
        assert_eq!(
            graph_err.issues(),
            &[GraphIssue::VersionTooLow {
                dependent: "a".to_string(),
                target: "b".to_string(),
                required: v("2.0.0"),
                actual: v("1.9.5"),
            }]
        );

        for ok_version in ["2.0.0", "2.0.1", "10.0.0"] {
            let b = Manifest::new("b", "B", v(ok_version));
            assert!(resolve(&[a.clone(), b], ResolutionMode::Validated).is_ok());
        }
    }

    #[test]
    fn test_all_problems_collected() {
        let manifests = vec![
            Manifest::new("a", "A", v("1.0.0"))
                .with_dependency(Dependency::required("missing"))
                .with_dependency(Dependency::required("b").at_least(v("3.0.0"))),
            module("b", &["c"]),
            module("c", &["b"]),
            module("c", &[]),
        ];
        let err = DependencyGraph::build(&manifests).activation_order().unwrap_err();

        let kinds: Vec<&str> = err
            .issues()
            .iter()
            .map(|issue| match issue {
                GraphIssue::MissingDependency { .. } => "missing",
                GraphIssue::VersionTooLow { .. } => "version",
                GraphIssue::CircularDependency { .. } => "cycle",
                GraphIssue::DuplicateModule { .. } => "duplicate",
            })
            .collect();
        assert_eq!(kinds, vec!["duplicate", "missing", "version", "cycle"]);
    }

    // ==================== 解析关闭 ====================

    #[test]
    fn test_resolution_disabled_returns_registration_order() {
        let manifests = vec![
            module("mail", &["core"]),
            module("core", &[]),
            module("broken", &["nowhere"]),
        ];
        let order = resolve(&manifests, ResolutionMode::RegistrationOrder).unwrap();
        assert_eq!(order.as_slice(), &["mail", "core", "broken"]);
        assert_eq!(ResolutionMode::from_enabled(false), ResolutionMode::RegistrationOrder);
    }

    // ==================== 查询 ====================

    #[test]
    fn test_graph_queries() {
        let manifests = vec![
            module("app", &["service"]),
            module("service", &["database"]),
            module("worker", &["database"]),
            module("database", &[]),
        ];
        let graph = DependencyGraph::build(&manifests);

        assert_eq!(graph.module_count(), 4);
        assert!(graph.contains_module("worker"));
        assert_eq!(graph.get_dependencies("app"), vec!["service"]);
        assert_eq!(graph.get_dependents("database"), vec!["service", "worker"]);
        assert_eq!(graph.get_all_dependencies("app"), vec!["database", "service"]);
        assert_eq!(graph.node("app").unwrap().state(), VisitState::Unvisited);
    }

    #[test]
    fn test_empty_graph() {
        let mut graph = DependencyGraph::build(&[]);
        assert!(graph.is_empty());
        assert!(graph.activation_order().unwrap().is_empty());
    }
}
