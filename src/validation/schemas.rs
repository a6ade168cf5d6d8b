use super::{Field, Rule, Schema};

const NAME: &[Rule] = &[Rule::MinLen(2), Rule::MaxLen(30)];

pub static SIGN_UP: Schema = Schema::new(&[
    Field::required("email", &[Rule::Email]),
    Field::required("password", &[Rule::MinLen(8)]),
    Field::optional("name", NAME),
    Field::optional("about", NAME),
    Field::optional("avatar", &[Rule::Link]),
]);

pub static SIGN_IN: Schema = Schema::new(&[
    Field::required("email", &[Rule::Email]),
    Field::required("password", &[]),
]);

pub static PROFILE_UPDATE: Schema = Schema::new(&[
    Field::required("name", NAME),
    Field::required("about", NAME),
]);

pub static AVATAR_UPDATE: Schema = Schema::new(&[Field::required("avatar", &[Rule::Link])]);

pub static CARD_CREATE: Schema = Schema::new(&[
    Field::required("name", NAME),
    Field::required("link", &[Rule::Link]),
]);
