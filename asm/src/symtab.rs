use indexmap::IndexMap;
use obj::Binding;

/// Section a symbol or the location counter currently lives in.
/// `None` marks symbols that are declared but not placed anywhere
/// (undefined / external).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Text,
    Data,
    Bss,
    RoData,
    None,
}

impl SectionType {
    /// Fixed object-file index: `.text`=0, `.data`=1, `.bss`=2,
    /// `.rodata`=3, undefined = -1.
    pub fn index(self) -> i16 {
        match self {
            SectionType::Text => 0,
            SectionType::Data => 1,
            SectionType::Bss => 2,
            SectionType::RoData => 3,
            SectionType::None => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub section: SectionType,
    pub value: u32,
    pub bind: Binding,
    pub defined: bool,
}

impl Symbol {
    fn undefined(name: &str) -> Self {
        Symbol {
            name: name.to_string(),
            section: SectionType::None,
            value: 0,
            bind: Binding::Local,
            defined: false,
        }
    }
}

/// Per-translation-unit symbol table. Insertion order is preserved but
/// never observable in output: the object emitter sorts by name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Idempotent insert: returns the existing entry or a fresh
    /// undefined local one.
    pub fn declare(&mut self, name: &str) -> &mut Symbol {
        self.map
            .entry(name.to_string())
            .or_insert_with(|| Symbol::undefined(name))
    }

    /// Creates or completes a symbol definition. Fails if the symbol is
    /// already defined.
    pub fn define(
        &mut self,
        name: &str,
        section: SectionType,
        offset: u32,
        bind: Binding,
    ) -> Result<&Symbol, String> {
        let sym = self.declare(name);
        if sym.defined {
            return Err(sym.name.clone());
        }
        sym.section = section;
        sym.value = offset;
        sym.bind = bind;
        sym.defined = true;
        Ok(sym)
    }

    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    pub fn all_symbols(&self) -> Vec<Symbol> {
        self.map.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
