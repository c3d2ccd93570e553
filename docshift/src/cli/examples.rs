use super::commands::{DOWN_EXAMPLES, RESOLVE_EXAMPLES, STATUS_EXAMPLES, UP_EXAMPLES};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "up",
            groups: UP_EXAMPLES,
        },
        CommandExample {
            name: "down",
            groups: DOWN_EXAMPLES,
        },
        CommandExample {
            name: "status",
            groups: STATUS_EXAMPLES,
        },
        CommandExample {
            name: "resolve",
            groups: RESOLVE_EXAMPLES,
        },
    ]
}
