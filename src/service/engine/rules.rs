//! File-backed rule core.
//!
//! Each rule-package is a file `<dir>/<name>.toml` (or any other format the
//! `config` crate understands) holding an ordered list of rules. Mounted
//! packages are flattened in order into a single [`RuleCore`].

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Arc,
};

use futures::stream::{self, BoxStream};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::base::{
    config::Config,
    types::{Input, Output, Res, Variables, WorkflowCall},
};

use super::{GenericCore, GenericCoreLoader, LoadedCore};

fn default_block() -> bool {
    true
}

/// A rule-package as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulePackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A single rule.
///
/// All matchers that are present must match; a rule without any matcher never
/// matches.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub exact: Option<String>,
    pub prefix: Option<String>,
    pub contains: Option<String>,
    /// Only match messages addressed to the bot.
    #[serde(default)]
    pub tome_only: bool,
    /// Stop evaluating later rules once this one matched.
    #[serde(default = "default_block")]
    pub block: bool,
    pub reply: Option<String>,
    pub workflow: Option<String>,
    #[serde(default)]
    pub variables: Variables,
}

impl Rule {
    /// If the rule matches, the arguments following its prefix (or empty).
    fn matches(&self, input: &Input) -> Option<String> {
        if self.exact.is_none() && self.prefix.is_none() && self.contains.is_none() {
            return None;
        }

        if self.tome_only && !input.is_tome() {
            return None;
        }

        let text = input.text.trim();

        if let Some(exact) = &self.exact
            && text != exact
        {
            return None;
        }

        if let Some(contains) = &self.contains
            && !text.contains(contains.as_str())
        {
            return None;
        }

        match &self.prefix {
            Some(prefix) => text.strip_prefix(prefix.as_str()).map(|args| args.trim().to_string()),
            None => Some(String::new()),
        }
    }

    fn outputs(&self, input: &Input, args: &str) -> Vec<Output> {
        let mut outputs = Vec::new();

        if let Some(reply) = &self.reply {
            outputs.push(Output::text(interpolate(reply, input, args)));
        }

        if let Some(workflow) = &self.workflow {
            let mut variables = input.variables.clone();

            for (key, value) in &self.variables {
                let value = match value {
                    Value::String(s) => Value::String(interpolate(s, input, args)),
                    other => other.clone(),
                };
                variables.insert(key.clone(), value);
            }

            outputs.push(Output::Workflow(WorkflowCall::new(workflow.clone(), variables)));
        }

        outputs
    }
}

/// Replace `{name}` placeholders with input values.
///
/// `{text}` is the full input text and `{args}` the text after the matched
/// prefix; other names come from the input variables. Unknown placeholders are
/// kept as written.
pub fn interpolate(template: &str, input: &Input, args: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        let value = match name {
            "text" => Some(input.text.clone()),
            "args" => Some(args.to_string()),
            _ => input.variables.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            }),
        };

        match value {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// A core evaluating an ordered list of rules.
pub struct RuleCore {
    rules: Arc<[Rule]>,
}

impl RuleCore {
    pub fn new(packages: impl IntoIterator<Item = RulePackage>) -> Self {
        let rules: Vec<Rule> = packages.into_iter().flat_map(|p| p.rules).collect();
        Self { rules: rules.into() }
    }
}

impl GenericCore for RuleCore {
    fn input(&self, input: Input) -> BoxStream<'static, Res<Output>> {
        let matches = RuleMatches {
            rules: self.rules.clone(),
            input,
            position: 0,
            pending: VecDeque::new(),
            stopped: false,
        };

        Box::pin(stream::iter(matches.map(Ok)))
    }
}

/// Lazy iterator over the outputs of matching rules.
struct RuleMatches {
    rules: Arc<[Rule]>,
    input: Input,
    position: usize,
    pending: VecDeque<Output>,
    stopped: bool,
}

impl Iterator for RuleMatches {
    type Item = Output;

    fn next(&mut self) -> Option<Output> {
        loop {
            if let Some(output) = self.pending.pop_front() {
                return Some(output);
            }

            if self.stopped || self.position >= self.rules.len() {
                return None;
            }

            let rule = &self.rules[self.position];
            self.position += 1;

            if let Some(args) = rule.matches(&self.input) {
                self.pending.extend(rule.outputs(&self.input, &args));
                self.stopped = rule.block;
            }
        }
    }
}

/// Loads rule-packages from a directory.
pub struct RuleFileLoader {
    dir: PathBuf,
}

impl RuleFileLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.packages_dir)
    }

    #[instrument(skip(self))]
    fn load_package(&self, name: &str) -> Res<RulePackage> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(anyhow::anyhow!("Invalid rule package name `{}`.", name));
        }

        let path = self.dir.join(name);
        let mut package: RulePackage = config::Config::builder()
            .add_source(config::File::with_name(&path.to_string_lossy()))
            .build()?
            .try_deserialize()?;

        if package.name.is_empty() {
            package.name = name.to_string();
        }

        debug!("Loaded rule package `{}` with {} rule(s).", package.name, package.rules.len());

        Ok(package)
    }
}

impl GenericCoreLoader for RuleFileLoader {
    fn load(&self, packages: &[String]) -> Res<LoadedCore> {
        let mut mounted = Vec::new();
        let mut loaded = Vec::new();
        let mut failed = Vec::new();

        for name in packages {
            match self.load_package(name) {
                Ok(package) => {
                    mounted.push(package);
                    loaded.push(name.clone());
                }
                Err(err) => {
                    warn!("Skipping rule package `{}`: {}", name, err);
                    failed.push(name.clone());
                }
            }
        }

        Ok(LoadedCore {
            core: Arc::new(RuleCore::new(mounted)),
            loaded,
            failed,
        })
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    fn input(text: &str, is_tome: bool) -> Input {
        let mut variables = Variables::new();
        variables.insert("nickname".into(), json!("Alice"));
        variables.insert("user_id".into(), json!("U1"));
        variables.insert("group_id".into(), Value::Null);
        variables.insert("is_tome".into(), json!(is_tome));
        Input::new(text, variables)
    }

    fn rule(prefix: &str, reply: &str) -> Rule {
        Rule {
            exact: None,
            prefix: Some(prefix.to_string()),
            contains: None,
            tome_only: false,
            block: true,
            reply: Some(reply.to_string()),
            workflow: None,
            variables: Variables::new(),
        }
    }

    async fn run(core: &RuleCore, input: Input) -> Vec<Output> {
        core.input(input).map(|o| o.unwrap()).collect().await
    }

    #[test]
    fn interpolates_known_and_keeps_unknown() {
        let input = input(".hello world", true);

        assert_eq!(interpolate("Hi {nickname}, you said {args}.", &input, "world"), "Hi Alice, you said world.");
        assert_eq!(interpolate("{missing} {group_id}|", &input, ""), "{missing} |");
        assert_eq!(interpolate("{is_tome} {text}", &input, ""), "true .hello world");
        assert_eq!(interpolate("open {brace", &input, ""), "open {brace");
    }

    #[tokio::test]
    async fn first_blocking_match_wins() {
        let core = RuleCore::new([RulePackage {
            name: "greeting".into(),
            rules: vec![rule(".hello", "Hello, {nickname}!"), rule(".hel", "never")],
        }]);

        assert_eq!(run(&core, input(".hello", true)).await, vec![Output::text("Hello, Alice!")]);
        assert!(run(&core, input("nothing here", true)).await.is_empty());
    }

    #[tokio::test]
    async fn non_blocking_rules_fall_through() {
        let mut first = rule("!", "first {args}");
        first.block = false;

        let core = RuleCore::new([
            RulePackage {
                name: "a".into(),
                rules: vec![first],
            },
            RulePackage {
                name: "b".into(),
                rules: vec![rule("!", "second")],
            },
        ]);

        assert_eq!(run(&core, input("! go", true)).await, vec![Output::text("first go"), Output::text("second")]);
    }

    #[tokio::test]
    async fn tome_only_and_matcherless_rules() {
        let mut addressed = rule(".r", "rolled");
        addressed.tome_only = true;

        let mut bare = rule(".r", "bare");
        bare.prefix = None;

        let core = RuleCore::new([RulePackage {
            name: "dice".into(),
            rules: vec![bare, addressed],
        }]);

        assert!(run(&core, input(".r", false)).await.is_empty());
        assert_eq!(run(&core, input(".r", true)).await, vec![Output::text("rolled")]);
    }

    #[tokio::test]
    async fn workflow_variables_overlay_input() {
        let mut variables = Variables::new();
        variables.insert("emoji".into(), json!("wave"));
        variables.insert("nickname".into(), json!("{nickname}!"));

        let core = RuleCore::new([RulePackage {
            name: "react".into(),
            rules: vec![Rule {
                exact: Some(".wave".into()),
                prefix: None,
                contains: None,
                tome_only: false,
                block: true,
                reply: None,
                workflow: Some("react".into()),
                variables,
            }],
        }]);

        let outputs = run(&core, input(" .wave ", true)).await;
        let [Output::Workflow(call)] = outputs.as_slice() else {
            panic!("expected a single workflow output, got {outputs:?}");
        };

        assert_eq!(call.name, "react");
        assert_eq!(call.variables["emoji"], json!("wave"));
        assert_eq!(call.variables["nickname"], json!("Alice!"));
        assert_eq!(call.variables["user_id"], json!("U1"));
    }

    #[tokio::test]
    async fn loads_packages_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greeting.toml"),
            r#"
[[rules]]
prefix = ".hello"
reply = "Hello, {nickname}!"

[[rules]]
contains = "wave"
workflow = "react"

[rules.variables]
emoji = "wave"
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "rules = 3").unwrap();

        let loader = RuleFileLoader::new(dir.path());
        let loaded = loader
            .load(&["greeting".to_string(), "missing".to_string(), "broken".to_string(), "../greeting".to_string()])
            .unwrap();

        assert_eq!(loaded.loaded, vec!["greeting".to_string()]);
        assert_eq!(loaded.failed, vec!["missing".to_string(), "broken".to_string(), "../greeting".to_string()]);

        let outputs: Vec<_> = loaded.core.input(input(".hello", true)).map(|o| o.unwrap()).collect().await;
        assert_eq!(outputs, vec![Output::text("Hello, Alice!")]);

        let outputs: Vec<_> = loaded.core.input(input("big wave", true)).map(|o| o.unwrap()).collect().await;
        assert!(matches!(outputs.as_slice(), [Output::Workflow(call)] if call.name == "react" && call.variables["emoji"] == json!("wave")));
    }

    #[tokio::test]
    async fn bundled_greeting_package_loads() {
        let loader = RuleFileLoader::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("packages"));
        let loaded = loader.load(&["greeting".to_string()]).unwrap();

        assert!(loaded.failed.is_empty());

        let outputs: Vec<_> = loaded.core.input(input(".echo hi there", true)).map(|o| o.unwrap()).collect().await;
        let [Output::Workflow(call)] = outputs.as_slice() else {
            panic!("expected a single workflow output, got {outputs:?}");
        };

        assert_eq!(call.name, "reply");
        assert_eq!(call.variables["text"], json!("Alice said: hi there"));
    }
}
