use crate::domain::entities::{Category, ModuleMeta};
use crate::plugins::{Module, ModuleBase};

pub struct HelloModule {
    base: ModuleBase,
}

impl HelloModule {
    pub fn new() -> Self {
        let mut base = ModuleBase::new(
            ModuleMeta::new("Hello")
                .with_description("Greetings")
                .with_category(Category::Fun),
        );
        base.register_command("hello", "👋 Say hello", |inv| async move {
            let name = if inv.args.is_empty() {
                "World".to_string()
            } else {
                inv.args_text()
            };
            inv.edit(format!("👋 Hello, {}!", name)).await
        });
        Self { base }
    }
}

impl Default for HelloModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for HelloModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }
}

pub fn create() -> Box<dyn Module> {
    Box::new(HelloModule::new())
}
