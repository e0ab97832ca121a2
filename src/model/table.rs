// In-memory symbol table keyed by symbol id

use std::collections::HashMap;

use super::symbol::CodeSymbol;

/// Ordered symbol table with last-write-wins upsert.
///
/// Re-upserting a symbol replaces it in place but keeps the fields that
/// external collaborators own (`pattern`, `violations`, `explanation`,
/// `explanation_hash`) unless the incoming record sets them.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<CodeSymbol>,
    positions: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, mut symbol: CodeSymbol) {
        match self.positions.get(&symbol.id) {
            Some(&pos) => {
                symbol.carry_external_fields(&self.symbols[pos]);
                self.symbols[pos] = symbol;
            }
            None => {
                self.positions.insert(symbol.id.clone(), self.symbols.len());
                self.symbols.push(symbol);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeSymbol> {
        self.symbols.iter()
    }

    pub fn into_vec(self) -> Vec<CodeSymbol> {
        self.symbols
    }
}
