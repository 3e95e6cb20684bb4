//! Parsed YANG statement trees.
//!
//! Statements are stored in an arena owned by [`StatementTree`]; the
//! [`Stmt`] handle pairs the arena with a [`StmtId`] and provides
//! navigation. Substatement order is preserved exactly as parsed.

use smol_str::SmolStr;

/// Index of a statement within its [`StatementTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(u32);

impl StmtId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the parsed YANG abstract syntax.
#[derive(Debug, Clone)]
pub struct StatementData {
    /// Keyword local part (`leaf`, `type`, ...).
    pub keyword: SmolStr,
    /// Prefix for extension keywords (`prefix:keyword`); not resolved here.
    pub prefix: Option<SmolStr>,
    /// Argument string, with quoting and concatenation already applied.
    pub argument: Option<String>,
    pub parent: Option<StmtId>,
    pub children: Vec<StmtId>,
}

/// Arena storage for one module's statement tree - single source of truth.
#[derive(Debug, Clone)]
pub struct StatementTree {
    arena: Vec<StatementData>,
    root: StmtId,
}

impl StatementTree {
    pub(crate) fn new() -> Self {
        Self {
            arena: Vec::new(),
            root: StmtId(0),
        }
    }

    pub(crate) fn alloc(
        &mut self,
        keyword: SmolStr,
        prefix: Option<SmolStr>,
        argument: Option<String>,
        parent: Option<StmtId>,
    ) -> StmtId {
        let id = StmtId::new(self.arena.len());
        self.arena.push(StatementData {
            keyword,
            prefix,
            argument,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.arena[parent.index()].children.push(id);
        }
        id
    }

    pub(crate) fn set_root(&mut self, id: StmtId) {
        self.root = id;
    }

    /// The top-level `module` or `submodule` statement.
    pub fn root(&self) -> Stmt<'_> {
        self.get(self.root)
    }

    pub fn get(&self, id: StmtId) -> Stmt<'_> {
        Stmt { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn data(&self, id: StmtId) -> &StatementData {
        &self.arena[id.index()]
    }
}

/// A borrowed handle to one statement in a [`StatementTree`].
#[derive(Debug, Clone, Copy)]
pub struct Stmt<'a> {
    tree: &'a StatementTree,
    id: StmtId,
}

impl<'a> Stmt<'a> {
    pub fn id(&self) -> StmtId {
        self.id
    }

    pub fn tree(&self) -> &'a StatementTree {
        self.tree
    }

    pub fn keyword(&self) -> &'a str {
        &self.tree.data(self.id).keyword
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.tree.data(self.id).prefix.as_deref()
    }

    /// True for built-in (unprefixed) keywords.
    pub fn is_builtin(&self) -> bool {
        self.tree.data(self.id).prefix.is_none()
    }

    pub fn argument(&self) -> Option<&'a str> {
        self.tree.data(self.id).argument.as_deref()
    }

    pub fn parent(&self) -> Option<Stmt<'a>> {
        self.tree.data(self.id).parent.map(|id| self.tree.get(id))
    }

    pub fn children(self) -> impl Iterator<Item = Stmt<'a>> {
        let tree = self.tree;
        tree.data(self.id).children.iter().map(move |&id| tree.get(id))
    }

    /// All built-in substatements with the given keyword, in source order.
    pub fn find_all(self, keyword: &'static str) -> impl Iterator<Item = Stmt<'a>> {
        self.children()
            .filter(move |c| c.is_builtin() && c.keyword() == keyword)
    }

    /// First built-in substatement with the given keyword.
    pub fn find1(self, keyword: &str) -> Option<Stmt<'a>> {
        self.children()
            .find(|c| c.is_builtin() && c.keyword() == keyword)
    }

    /// Argument of the first substatement with the given keyword.
    pub fn arg_of(self, keyword: &str) -> Option<&'a str> {
        self.find1(keyword).and_then(|s| s.argument())
    }

    /// First substatement with the given keyword and argument.
    pub fn find1_arg(self, keyword: &str, argument: &str) -> Option<Stmt<'a>> {
        self.children().find(|c| {
            c.is_builtin() && c.keyword() == keyword && c.argument() == Some(argument)
        })
    }

    /// Ancestors from the parent outwards, ending at the (sub)module root.
    pub fn ancestors(self) -> impl Iterator<Item = Stmt<'a>> {
        std::iter::successors(self.parent(), |s| s.parent())
    }
}
