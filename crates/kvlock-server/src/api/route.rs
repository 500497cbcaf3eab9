use actix_web::{Scope, web};

use super::{counter, metrics};

pub fn routes() -> Scope {
    web::scope("")
        .service(counter::increment)
        .service(metrics::render)
}
