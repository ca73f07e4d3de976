use calmform::form::FormModel;

#[derive(FormModel)]
enum Draft {
    Email(String),
}

fn main() {}
