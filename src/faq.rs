//! Built-in brand FAQ corpus. Questions are embedded and snapshotted by the
//! FAQ index exactly like catalog products.

use crate::models::Faq;

pub fn default_faqs() -> Vec<Faq> {
    FAQ_TABLE
        .iter()
        .map(|(question, answer)| Faq {
            question: question.to_string(),
            answer: answer.to_string(),
            embedding: None,
        })
        .collect()
}

const FAQ_TABLE: &[(&str, &str)] = &[
    (
        "¿Cuánto tarda el envío?",
        "Los pedidos nacionales llegan en 24-72 horas laborables. Los envíos internacionales pueden tardar entre 5 y 10 días.",
    ),
    (
        "¿Cuál es la política de devoluciones?",
        "Tienes 30 días desde la entrega para devolver cualquier artículo sin usar. El primer cambio de talla es gratuito.",
    ),
    (
        "¿Cómo sé qué talla elegir?",
        "Cada producto incluye una guía de tallas en su ficha. Si estás entre dos tallas, te recomendamos la superior.",
    ),
    (
        "¿Qué métodos de pago aceptáis?",
        "Aceptamos tarjeta de crédito y débito, PayPal y Bizum. El pago se procesa de forma segura.",
    ),
    (
        "¿Cómo puedo seguir mi pedido?",
        "Cuando tu pedido sale del almacén recibes un correo con el número de seguimiento. También puedes preguntarme aquí con tu número de pedido y tu email.",
    ),
    (
        "¿Hacéis envíos internacionales?",
        "Sí, enviamos a toda la Unión Europea. Los gastos de aduana fuera de la UE corren por cuenta del cliente.",
    ),
    (
        "¿Los gastos de envío son gratuitos?",
        "El envío es gratuito a partir de 60 EUR. Por debajo de ese importe son 4,95 EUR.",
    ),
    (
        "¿Cómo cuido las prendas?",
        "Recomendamos lavar a máquina a 30 grados, del revés y sin secadora para conservar colores y estampados.",
    ),
];
