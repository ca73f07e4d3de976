use calmform::form::FormModel;

#[derive(FormModel)]
struct Draft {
    #[form(default)]
    email: String,
}

fn main() {}
