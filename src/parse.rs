use std::cell::RefCell;

use tree_sitter::{Parser, Tree};

/// The tree-sitter grammar a source file parses under.
///
/// Distinct from the language adapter: the TypeScript adapter routes `.tsx`
/// and `.jsx` to the TSX grammar and plain `.js` to the JavaScript grammar,
/// but classification and resolution are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Java,
    Ruby,
    Rust,
}

// Thread-local Parser instances, one per rayon worker thread. Each Parser is
// initialised once per thread with the appropriate grammar.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_PY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_python::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_GO: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_go::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_JAVA: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_java::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_RUBY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_ruby::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_RS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_rust::LANGUAGE.into()).unwrap();
        p
    });
}

/// Parse `source` under the given grammar using the calling thread's parser.
///
/// Returns `None` only when tree-sitter itself gives up (cancellation or a
/// pathological input). Ordinary syntax errors still produce a tree with
/// ERROR nodes, and extraction proceeds over whatever parsed; a file the
/// grammar cannot make sense of simply yields nothing.
pub fn parse(grammar: Grammar, source: &[u8]) -> Option<Tree> {
    let cell = match grammar {
        Grammar::TypeScript => &PARSER_TS,
        Grammar::Tsx => &PARSER_TSX,
        Grammar::JavaScript => &PARSER_JS,
        Grammar::Python => &PARSER_PY,
        Grammar::Go => &PARSER_GO,
        Grammar::Java => &PARSER_JAVA,
        Grammar::Ruby => &PARSER_RUBY,
        Grammar::Rust => &PARSER_RS,
    };
    cell.with(|parser| parser.borrow_mut().parse(source, None))
}

/// The `LANGUAGE_TYPESCRIPT` language object, for compiling queries against.
pub fn typescript_language() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

/// The TSX language object. Queries must be compiled per language even when
/// the pattern text is identical.
pub fn tsx_language() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

/// The JavaScript language object.
pub fn javascript_language() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}
