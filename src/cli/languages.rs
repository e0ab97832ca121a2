use symgraph::indexer::parser::ParserRegistry;

pub fn list_languages() {
    let registry = ParserRegistry::new();

    println!("Supported languages:");
    for language in registry.languages() {
        println!("  - {}", language);
    }
}
