//! 路由声明与声明表
//!
//! 声明式导航的匹配层：`when` 键是不透明字符串，精确声明优先，
//! 其次是最长前缀匹配。声明表是不可变的编译快照，只在声明集合
//! 变化时整表重建，从不逐次导航修改。

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::component::ComponentRef;
use crate::registry::NavigationIntent;

/// 路由守卫
///
/// 宿主提供的异步放行判定。返回 `false`、出错、panic 或在守卫超时
/// 内未完成都视为拒绝。
pub type RouteGuard = Arc<dyn Fn(&NavigationIntent) -> BoxFuture<'static, bool> + Send + Sync>;

/// 路由声明
#[derive(Clone)]
pub struct RouteDeclaration {
    /// 匹配键（不透明字符串）
    pub when: String,

    /// 命中后挂载的组件引用
    pub component: ComponentRef,

    /// 是否要求精确匹配（否则按前缀匹配）
    pub exact: bool,

    /// 可选守卫
    pub guard: Option<RouteGuard>,
}

impl RouteDeclaration {
    /// 创建精确匹配声明
    pub fn exact(when: impl Into<String>, component: impl Into<ComponentRef>) -> Self {
        Self {
            when: when.into(),
            component: component.into(),
            exact: true,
            guard: None,
        }
    }

    /// 创建前缀匹配声明
    pub fn prefix(when: impl Into<String>, component: impl Into<ComponentRef>) -> Self {
        Self {
            when: when.into(),
            component: component.into(),
            exact: false,
            guard: None,
        }
    }

    /// 附加守卫
    pub fn with_guard(mut self, guard: RouteGuard) -> Self {
        self.guard = Some(guard);
        self
    }
}

impl std::fmt::Debug for RouteDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDeclaration")
            .field("when", &self.when)
            .field("component", &self.component)
            .field("exact", &self.exact)
            .field("guard", &self.guard.is_some())
            .finish()
    }
}

/// 声明表
///
/// 编译快照：精确键进哈希表，前缀键按长度降序排列，保证最长前缀
/// 优先命中。
pub struct DeclarationTable {
    /// 全部声明
    declarations: Vec<RouteDeclaration>,

    /// 精确键 -> 声明下标
    exact: HashMap<String, usize>,

    /// 前缀声明下标，按 `when` 长度降序
    prefixes: Vec<usize>,
}

impl DeclarationTable {
    /// 编译声明集合
    ///
    /// 同键的精确声明后注册的覆盖先注册的。
    pub fn compile(declarations: Vec<RouteDeclaration>) -> Self {
        let mut exact = HashMap::new();
        let mut prefixes = Vec::new();

        for (idx, decl) in declarations.iter().enumerate() {
            if decl.exact {
                exact.insert(decl.when.clone(), idx);
            } else {
                prefixes.push(idx);
            }
        }
        prefixes.sort_by(|a, b| {
            declarations[*b]
                .when
                .len()
                .cmp(&declarations[*a].when.len())
        });

        Self {
            declarations,
            exact,
            prefixes,
        }
    }

    /// 空表
    pub fn empty() -> Self {
        Self::compile(Vec::new())
    }

    /// 按键查找声明
    ///
    /// 精确命中优先，其次最长前缀。
    pub fn find(&self, key: &str) -> Option<&RouteDeclaration> {
        if let Some(idx) = self.exact.get(key) {
            return Some(&self.declarations[*idx]);
        }
        self.prefixes
            .iter()
            .map(|idx| &self.declarations[*idx])
            .find(|decl| key.starts_with(&decl.when))
    }

    /// 声明数量
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DeclarationTable {
        DeclarationTable::compile(vec![
            RouteDeclaration::exact("settings", "settings-panel"),
            RouteDeclaration::prefix("detail", "detail-panel"),
            RouteDeclaration::prefix("detail/compare", "compare-panel"),
        ])
    }

    #[test]
    fn test_exact_match_wins() {
        let table = table();
        let decl = table.find("settings").unwrap();
        assert!(matches!(decl.component, ComponentRef::Tag(ref t) if t == "settings-panel"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        let decl = table.find("detail/compare/left").unwrap();
        assert!(matches!(decl.component, ComponentRef::Tag(ref t) if t == "compare-panel"));

        let decl = table.find("detail/42").unwrap();
        assert!(matches!(decl.component, ComponentRef::Tag(ref t) if t == "detail-panel"));
    }

    #[test]
    fn test_no_match() {
        let table = table();
        assert!(table.find("unknown").is_none());
        // 精确声明不做前缀匹配
        assert!(table.find("settings/advanced").is_none());
    }

    #[test]
    fn test_later_exact_declaration_overrides() {
        let table = DeclarationTable::compile(vec![
            RouteDeclaration::exact("a", "first"),
            RouteDeclaration::exact("a", "second"),
        ]);
        let decl = table.find("a").unwrap();
        assert!(matches!(decl.component, ComponentRef::Tag(ref t) if t == "second"));
    }

    #[test]
    fn test_empty_table() {
        let table = DeclarationTable::empty();
        assert!(table.is_empty());
        assert!(table.find("anything").is_none());
    }
}
