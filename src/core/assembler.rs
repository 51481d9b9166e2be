//! Bootstrap document assembly — substitution, script persistence, layout.
//!
//! Consumes a resolution plan in order: substitutes the five placeholder
//! tokens into each recipe script, persists the result in the deployment
//! store under a key derived from the application and recipe identifiers,
//! and emits a fetch-and-execute stanza per recipe between the preamble and
//! postamble. A store failure aborts assembly; no partial document reaches
//! disk.

use super::error::{Error, Result};
use super::templates::{
    POSTAMBLE, PREAMBLE, TOKEN_DEP, TOKEN_ID, TOKEN_NAME, TOKEN_TOKEN, TOKEN_URL,
};
use super::types::{Application, BootstrapOptions, ResolutionPlan};
use crate::client::{Catalog, Store};
use crate::core::resolver;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Replace the five placeholder tokens with their context values.
///
/// Idempotent: tokens do not reappear after the first pass, so applying the
/// substitution to an already-substituted document is a no-op.
pub fn substitute(text: &str, options: &BootstrapOptions, run_name: &str) -> String {
    text.replace(TOKEN_ID, &options.application)
        .replace(TOKEN_URL, options.deployment_address())
        .replace(TOKEN_TOKEN, &options.deployment_token)
        .replace(TOKEN_DEP, &options.deployment)
        .replace(TOKEN_NAME, run_name)
}

/// Store key for one resolved recipe script.
pub fn script_key(application: &str, recipe_id: &str) -> String {
    format!("_recipe{}_{}", application, recipe_id)
}

/// The stanza a provisioned machine runs for one stored recipe: download by
/// key, normalize line endings, mark executable, execute with output
/// appended to the shared log.
fn fetch_stanza(key: &str) -> String {
    format!(
        "\n/opt/semilla/semilla-cli --deployment ${{SEM_DEP}} --url ${{SEM_URL}} --token $TOKEN get {key} > /opt/semilla/{key}.sh\n\
         dos2unix /opt/semilla/{key}.sh\n\
         chmod +x /opt/semilla/{key}.sh\n\
         /opt/semilla/{key}.sh &>> /opt/semilla/${{SEM_ID}}.log\n"
    )
}

/// Read an optional local env file (JSON map of string to string) and turn
/// it into export lines injected after the preamble. An `ssh_pub_key` entry
/// is additionally appended to the boot user's authorized keys. A missing or
/// malformed file contributes nothing.
pub fn env_exports(path: &Path) -> String {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return String::new(),
    };
    let inputs: std::collections::BTreeMap<String, String> = match serde_json::from_str(&data) {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed env file");
            return String::new();
        }
    };

    let mut exports = String::new();
    for (key, val) in &inputs {
        exports.push_str(&format!("export {}={:?}\n", key, val));
        if key == "ssh_pub_key" && !val.is_empty() {
            exports.push_str(&format!("echo {:?} >> ~/.ssh/authorized_keys\n", val));
        }
    }
    exports
}

/// Assemble the bootstrap document from a resolved plan.
///
/// Every recipe script is substituted and persisted through `store` before
/// its stanza is emitted; the first failed write aborts with
/// `ScriptPersistFailed`. The returned text has had the final whole-document
/// substitution pass applied.
pub fn assemble(
    store: &dyn Store,
    options: &BootstrapOptions,
    app: &Application,
    plan: &ResolutionPlan,
    env_file: Option<&Path>,
) -> Result<String> {
    let run_name = options.run_name(app);
    let mut doc = String::from(PREAMBLE);
    doc.push('\n');

    if let Some(path) = env_file {
        doc.push_str(&env_exports(path));
    }

    for section in &plan.sections {
        doc.push_str(&format!(
            "\n#*** Apply recipe {} **********\n",
            section.name
        ));

        for item in &section.items {
            let recipe = &item.recipe;
            if item.parent {
                doc.push_str(&format!(
                    "\n#*** Load parent recipe {}:{} **********\n",
                    recipe.name, recipe.id
                ));
            } else {
                doc.push_str(&format!(
                    "\n#*** Load recipe {}:{} **********\n",
                    recipe.name, recipe.id
                ));
            }

            let script = substitute(&recipe.script, options, run_name);
            let key = script_key(&options.application, &recipe.id);
            store
                .put(&options.deployment, &key, &script)
                .map_err(|e| Error::ScriptPersistFailed {
                    recipe: recipe.name.clone(),
                    source: Box::new(e),
                })?;
            info!(recipe = %recipe.name, key, "stored resolved script");

            doc.push_str(&fetch_stanza(&key));
        }

        doc.push_str("\n#****************************\n");
    }

    doc.push('\n');
    doc.push_str(POSTAMBLE);

    // Final pass covers the preamble, postamble, and stanzas themselves.
    Ok(substitute(&doc, options, run_name))
}

/// Write the assembled document to `{application}.sh`, or
/// `{application}-{name}.sh` when an explicit run name was given. Owner
/// read/write, world readable.
pub fn write_document(dir: &Path, options: &BootstrapOptions, text: &str) -> Result<PathBuf> {
    let file_name = match options.run_name.as_deref() {
        Some(name) if !name.is_empty() => format!("{}-{}.sh", options.application, name),
        _ => format!("{}.sh", options.application),
    };
    let path = dir.join(file_name);

    let io_err = |source: std::io::Error| Error::Io {
        path: path.display().to_string(),
        source,
    };
    std::fs::write(&path, text).map_err(&io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).map_err(&io_err)?;
    }

    info!(path = %path.display(), "bootstrap document written");
    Ok(path)
}

/// Full pipeline: fetch the application, resolve its recipe graph, assemble
/// the document, and write it under `dir`.
pub fn bootstrap(
    catalog: &dyn Catalog,
    store: &dyn Store,
    options: &BootstrapOptions,
    env_file: Option<&Path>,
    dir: &Path,
) -> Result<PathBuf> {
    let app = catalog.application(&options.namespace, &options.application)?;
    let plan = resolver::resolve(catalog, options, &app)?;
    let doc = assemble(store, options, &app, &plan, env_file)?;
    write_document(dir, options, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Recipe;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeCatalog {
        app: Application,
        recipes: HashMap<String, Recipe>,
    }

    impl Catalog for FakeCatalog {
        fn application(&self, _namespace: &str, _application: &str) -> Result<Application> {
            Ok(self.app.clone())
        }
        fn recipe(&self, _namespace: &str, id: &str) -> Result<Recipe> {
            self.recipes
                .get(id)
                .cloned()
                .ok_or_else(|| Error::RecipeNotFound {
                    recipe: id.to_string(),
                    status: 404,
                })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        puts: RefCell<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl Store for RecordingStore {
        fn put(&self, deployment: &str, key: &str, value: &str) -> Result<()> {
            if self.fail {
                return Err(Error::StoreWriteFailed {
                    key: key.to_string(),
                    status: 500,
                });
            }
            self.puts.borrow_mut().push((
                deployment.to_string(),
                key.to_string(),
                value.to_string(),
            ));
            Ok(())
        }
        fn get(&self, _deployment: &str, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn recipe(id: &str, name: &str, parent: Option<&str>) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            script: format!("echo setting up {} on ${{SEM_DEP}}", name),
            public: false,
            namespace: "ns1".to_string(),
            base_image: "debian".to_string(),
            parent: parent.map(|p| p.to_string()),
            tags: vec![],
        }
    }

    fn options() -> BootstrapOptions {
        BootstrapOptions {
            url: "https://catalog.example.org".to_string(),
            apikey: "key".to_string(),
            namespace: "ns1".to_string(),
            application: "app1".to_string(),
            deployment: "dep-42".to_string(),
            deployment_token: "dep-token".to_string(),
            deployment_address: "https://store.example.org".to_string(),
            run_name: Some("run-a".to_string()),
            tags: vec![],
        }
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog {
            app: Application {
                id: "app1".to_string(),
                name: "app1".to_string(),
                description: String::new(),
                public: false,
                recipes: vec!["r1".to_string(), "r2".to_string()],
                namespace: "ns1".to_string(),
                templates: indexmap::IndexMap::new(),
                inputs: indexmap::IndexMap::new(),
            },
            recipes: [
                recipe("r0", "r0", None),
                recipe("r1", "r1", Some("r0")),
                recipe("r2", "r2", None),
            ]
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect(),
        }
    }

    #[test]
    fn test_substitute_replaces_all_five_tokens() {
        let opts = options();
        let text = "${SEM_ID} ${SEM_URL} ${SEM_TOKEN} ${SEM_DEP} ${SEM_NAME}";
        let out = substitute(text, &opts, "run-a");
        assert_eq!(
            out,
            "app1 https://store.example.org dep-token dep-42 run-a"
        );
    }

    #[test]
    fn test_substitute_twice_is_noop() {
        let opts = options();
        let text = format!("{}\nbody ${{SEM_DEP}}\n{}", PREAMBLE, POSTAMBLE);
        let once = substitute(&text, &opts, "run-a");
        let twice = substitute(&once, &opts, "run-a");
        assert_eq!(once, twice);
        assert!(!once.contains("${SEM_DEP}"));
    }

    proptest! {
        #[test]
        fn prop_substitute_idempotent(body in "[a-zA-Z0-9 \n]{0,64}") {
            let opts = options();
            let text = format!("${{SEM_ID}} {} ${{SEM_NAME}}", body);
            let once = substitute(&text, &opts, "run-a");
            prop_assert_eq!(substitute(&once, &opts, "run-a"), once);
        }
    }

    #[test]
    fn test_script_key_scheme() {
        assert_eq!(script_key("app1", "abc123"), "_recipeapp1_abc123");
    }

    #[test]
    fn test_fetch_stanza_shape() {
        let s = fetch_stanza("_recipeapp1_r1");
        assert!(s.contains("get _recipeapp1_r1 > /opt/semilla/_recipeapp1_r1.sh"));
        assert!(s.contains("dos2unix /opt/semilla/_recipeapp1_r1.sh"));
        assert!(s.contains("chmod +x /opt/semilla/_recipeapp1_r1.sh"));
        assert!(s.contains("&>> /opt/semilla/${SEM_ID}.log"));
    }

    #[test]
    fn test_env_exports_missing_file_is_empty() {
        assert_eq!(env_exports(Path::new("/nonexistent/semilla.env")), "");
    }

    #[test]
    fn test_env_exports_map_and_ssh_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semilla.env");
        std::fs::write(
            &path,
            r#"{"DB_HOST": "10.0.0.5", "ssh_pub_key": "ssh-ed25519 AAAA user@host"}"#,
        )
        .unwrap();
        let out = env_exports(&path);
        assert!(out.contains("export DB_HOST=\"10.0.0.5\""));
        assert!(out.contains("export ssh_pub_key=\"ssh-ed25519 AAAA user@host\""));
        assert!(out.contains(">> ~/.ssh/authorized_keys"));
    }

    #[test]
    fn test_env_exports_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semilla.env");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(env_exports(&path), "");
    }

    #[test]
    fn test_assemble_document_order_and_stores() {
        let cat = catalog();
        let store = RecordingStore::default();
        let opts = options();
        let plan = resolver::resolve(&cat, &opts, &cat.app).unwrap();

        let doc = assemble(&store, &opts, &cat.app, &plan, None).unwrap();

        // Preamble first, postamble last
        assert!(doc.starts_with("#!/bin/bash"));
        assert!(doc.trim_end().ends_with("fi"));

        // Markers appear in plan order
        let apply_r1 = doc.find("#*** Apply recipe r1 ").unwrap();
        let load_r0 = doc.find("#*** Load parent recipe r0:r0 ").unwrap();
        let load_r1 = doc.find("#*** Load recipe r1:r1 ").unwrap();
        let apply_r2 = doc.find("#*** Apply recipe r2 ").unwrap();
        let over = doc.find("setup is over").unwrap();
        assert!(apply_r1 < load_r0);
        assert!(load_r0 < load_r1);
        assert!(load_r1 < apply_r2);
        assert!(apply_r2 < over);

        // All five tokens substituted everywhere
        for token in ["${SEM_ID}", "${SEM_URL}", "${SEM_TOKEN}", "${SEM_DEP}", "${SEM_NAME}"] {
            assert!(!doc.contains(token), "unsubstituted {}", token);
        }
        assert!(doc.contains("--deployment dep-42 --url https://store.example.org"));
        assert!(doc.contains("status_app_run-a_${HOSTNAME}"));

        // One store write per materialized recipe, substituted bodies
        let puts = store.puts.borrow();
        let keys: Vec<&str> = puts.iter().map(|(_, k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["_recipeapp1_r0", "_recipeapp1_r1", "_recipeapp1_r2"]
        );
        assert!(puts.iter().all(|(d, _, v)| d == "dep-42" && v.contains("dep-42")));
    }

    #[test]
    fn test_assemble_store_failure_aborts() {
        let cat = catalog();
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let opts = options();
        let plan = resolver::resolve(&cat, &opts, &cat.app).unwrap();
        let err = assemble(&store, &opts, &cat.app, &plan, None).unwrap_err();
        match err {
            Error::ScriptPersistFailed { recipe, source } => {
                assert_eq!(recipe, "r0");
                assert!(matches!(*source, Error::StoreWriteFailed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_document_names_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options();

        let path = write_document(dir.path(), &opts, "#!/bin/bash\n").unwrap();
        assert!(path.ends_with("app1-run-a.sh"));

        opts.run_name = None;
        let path = write_document(dir.path(), &opts, "#!/bin/bash\n").unwrap();
        assert!(path.ends_with("app1.sh"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_bootstrap_end_to_end() {
        let cat = catalog();
        let store = RecordingStore::default();
        let dir = tempfile::tempdir().unwrap();

        let path = bootstrap(&cat, &store, &options(), None, dir.path()).unwrap();
        let doc = std::fs::read_to_string(&path).unwrap();
        assert!(doc.contains("#*** Apply recipe r1 "));
        assert!(doc.contains("#*** Apply recipe r2 "));
        assert_eq!(store.puts.borrow().len(), 3);
    }

    #[test]
    fn test_bootstrap_failure_writes_no_file() {
        let cat = catalog();
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        assert!(bootstrap(&cat, &store, &options(), None, dir.path()).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_assemble_env_file_exports_land_after_preamble() {
        let cat = catalog();
        let store = RecordingStore::default();
        let opts = options();
        let plan = resolver::resolve(&cat, &opts, &cat.app).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join("semilla.env");
        std::fs::write(&env, r#"{"REGION": "eu-west-1"}"#).unwrap();

        let doc = assemble(&store, &opts, &cat.app, &plan, Some(&env)).unwrap();
        let export = doc.find("export REGION=\"eu-west-1\"").unwrap();
        let first_marker = doc.find("#*** Apply recipe").unwrap();
        assert!(export < first_marker);
    }
}
