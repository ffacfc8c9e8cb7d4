//! Static pages: the upload form and the extracted-data display.

use axum::extract::Query;
use axum::response::Html;
use serde::Deserialize;

use crate::api::twiml::escape_xml;

/// Default shown by `/datos` for a missing value.
pub const NOT_AVAILABLE: &str = "No disponible";

/// `GET /`: upload form.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE_HTML)
}

#[derive(Debug, Deserialize)]
pub struct DatosQuery {
    pub nombre: Option<String>,
    pub domicilio: Option<String>,
}

/// `GET /datos?nombre=&domicilio=`: echo the two values in a page.
pub async fn datos(Query(query): Query<DatosQuery>) -> Html<String> {
    let nombre = query.nombre.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let domicilio = query.domicilio.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    Html(render_datos(&nombre, &domicilio))
}

fn render_datos(nombre: &str, domicilio: &str) -> String {
    DATOS_PAGE_HTML
        .replace("{{nombre}}", &escape_xml(nombre))
        .replace("{{domicilio}}", &escape_xml(domicilio))
}

const INDEX_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Docmatch: Subir documento</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 480px; margin: 48px auto; padding: 0 16px; }
    pre { background: #f5f5f4; padding: 12px; white-space: pre-wrap; word-break: break-all; }
  </style>
</head>
<body>
  <h1>Subir documento</h1>
  <form id="upload" enctype="multipart/form-data">
    <input type="file" name="file" accept="image/*" required>
    <button type="submit">Procesar</button>
  </form>
  <pre id="result"></pre>
  <script>
    document.getElementById('upload').addEventListener('submit', async (e) => {
      e.preventDefault();
      const res = await fetch('/upload_file', { method: 'POST', body: new FormData(e.target) });
      const out = document.getElementById('result');
      try {
        const json = await res.json();
        if (json.resultado && json.resultado.imagen) { json.resultado.imagen = '[' + json.resultado.imagen.length + ' base64 chars]'; }
        out.textContent = JSON.stringify(json, null, 2);
      } catch (_) {
        out.textContent = 'Error ' + res.status;
      }
    });
  </script>
</body>
</html>"#;

const DATOS_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>Docmatch: Datos</title>
</head>
<body>
  <h1>Datos extraídos</h1>
  <p><strong>Nombre:</strong> {{nombre}}</p>
  <p><strong>Domicilio:</strong> {{domicilio}}</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datos_escapes_values() {
        let html = render_datos("<script>x</script>", "Calle 5 & 6");
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(html.contains("Calle 5 &amp; 6"));
        assert!(!html.contains("<script>x"));
    }

    #[tokio::test]
    async fn datos_defaults_missing_values() {
        let Html(html) = datos(Query(DatosQuery {
            nombre: Some("Ana".into()),
            domicilio: None,
        }))
        .await;
        assert!(html.contains("<strong>Nombre:</strong> Ana"));
        assert!(html.contains("<strong>Domicilio:</strong> No disponible"));
    }
}
