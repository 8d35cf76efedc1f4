//! Store and script fixtures

use demoflow::data::Database;
use demoflow::model::{DemoScript, Persona, Step, Theme};
use demoflow::SharedStore;
use tempfile::TempDir;

/// A shared store backed by a database in a temporary directory
pub struct TestStore {
    pub store: SharedStore,
    _dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::open(dir.path().join("test.db")).expect("Failed to open database");
        Self {
            store: SharedStore::new(db),
            _dir: dir,
        }
    }
}

/// Script with the personas every test can reference and no steps
pub fn base_script() -> DemoScript {
    let mut script = DemoScript {
        theme: Theme::new("light"),
        product: "Ledger".into(),
        customer: "Acme".into(),
        ..Default::default()
    };
    script.personas.insert(
        "john".into(),
        Persona::new("John Doe", "CFO")
            .with_picture("personas/john.png")
            .with_fake_text(vec![
                "Approved, ship it.".into(),
                "Can we revisit pricing?".into(),
            ]),
    );
    script
        .personas
        .insert("ana".into(), Persona::new("Ana Lima", "Controller"));
    script
}

/// One-step script: a single page with John Doe on it
pub fn single_step_script() -> DemoScript {
    let mut script = base_script();
    script.steps.push(
        Step::new("Review invoice")
            .with_urls(["https://a.example"])
            .with_persona("john"),
    );
    script
}

/// Several steps mixing personas, colors and isolated windows
pub fn tour_script() -> DemoScript {
    let mut script = base_script();
    script.steps.push(
        Step::new("Inbox")
            .with_urls(["https://s0-0.example", "https://s0-1.example"])
            .with_persona("john")
            .with_tab_color("blue"),
    );
    script.steps.push(
        Step::new("Private approval")
            .with_urls(["https://s1-0.example", "https://s1-1.example"])
            .with_persona("ana")
            .incognito(),
    );
    script.steps.push(
        Step::new("Reports")
            .with_urls([
                "https://s2-0.example",
                "https://s2-1.example",
                "https://s2-2.example",
            ])
            .with_tab_color("chartreuse"),
    );
    script.steps.push(
        Step::new("Second private")
            .with_urls(["https://s3-0.example"])
            .incognito(),
    );
    script
}

/// JSON for `single_step_script`, as an author would write it
pub const SINGLE_STEP_JSON: &str = r#"{
  "theme": "light",
  "product": "Ledger",
  "customer": "Acme",
  "personas": {
    "john": {
      "name": "John Doe",
      "title": "CFO",
      "fakeText": ["Approved, ship it."]
    }
  },
  "steps": [
    {
      "title": "Review invoice",
      "description": "The CFO signs off",
      "urls": ["https://a.example"],
      "persona": "john",
      "tabColor": "blue"
    }
  ]
}"#;
