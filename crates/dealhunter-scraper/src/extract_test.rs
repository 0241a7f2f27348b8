use super::*;

fn extract(url: &str, body: &str) -> ExtractionResult {
    let page = RenderedPage::from_markup(url, format!("<html><body>{body}</body></html>"));
    extract_fields(&page, &RetailerRegistry::builtin(), PriceBounds::default())
}

fn image(src: &str, alt: &str, width: f64, height: f64) -> ImageInfo {
    ImageInfo {
        src: src.to_string(),
        alt: alt.to_string(),
        width,
        height,
    }
}

#[test]
fn simple_product_page() {
    let result = extract(
        "https://shop.example.com/acme-widget",
        r#"<h1>Acme Widget</h1><span class="price">$19.99</span>"#,
    );
    assert_eq!(result.title.as_deref(), Some("Acme Widget"));
    assert_eq!(result.price.as_deref(), Some("19.99"));
    assert_eq!(result.availability, Availability::InStock);
    assert!(result.retailer.is_none());
}

#[test]
fn retailer_title_selector_beats_generic_h1() {
    let result = extract(
        "https://www.amazon.com/dp/B000TEST",
        r#"<h1>Sponsored banner</h1><span id="productTitle"> Acme Widget, Blue </span>"#,
    );
    assert_eq!(result.title.as_deref(), Some("Acme Widget, Blue"));
    assert_eq!(result.retailer.as_deref(), Some("Amazon"));
}

#[test]
fn amazon_shipping_fee_is_not_the_price() {
    let result = extract(
        "https://www.amazon.com/dp/B000TEST",
        r#"<div class="delivery-message"><div><span class="a-price"><span class="a-offscreen">$6.99</span></span> shipping fee</div></div>
           <div id="centerCol"><span class="a-price"><span class="a-offscreen">$24.99</span></span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("24.99"));
}

#[test]
fn walmart_shipping_fee_is_not_the_price() {
    let result = extract(
        "https://www.walmart.com/ip/123",
        r#"<div class="shipping-panel"><div><span class="price-current">$7.99</span> delivery fee</div></div>
           <div data-automation-id="product-overview"><span class="price-current">$24.99</span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("24.99"));
    assert_eq!(result.retailer.as_deref(), Some("Walmart"));
}

#[test]
fn target_shipping_cost_is_not_the_price() {
    let result = extract(
        "https://www.target.com/p/acme/-/A-1",
        r#"<div class="delivery-options"><div><span data-test="product-price">$5.99</span> shipping cost</div></div>
           <div><span data-test="product-price">$24.99</span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("24.99"));
}

#[test]
fn lego_shipping_fee_is_not_the_price() {
    let result = extract(
        "https://www.lego.com/en-us/product/castle-10305",
        r#"<div class="shipping-info"><div><span data-testid="product-price">$4.99</span> shipping fee</div></div>
           <div><span data-testid="product-price">$399.99</span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("399.99"));
    assert_eq!(result.retailer.as_deref(), Some("Lego"));
}

#[test]
fn generic_shipping_fee_is_not_the_price() {
    let result = extract(
        "https://www.meijer.com/shopping/product/acme/1.html",
        r#"<div id="shipping-details"><div><span class="price">$9.99</span> Shipping fee</div></div>
           <div><span class="price">$24.99</span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("24.99"));
    assert_eq!(result.retailer.as_deref(), Some("Meijer"));
}

#[test]
fn out_of_bounds_prices_are_never_chosen() {
    let result = extract(
        "https://shop.example.com/x",
        r#"<main><h1>Acme Widget</h1><span class="price">$0.25</span><span class="price">$75,000.00</span></main>"#,
    );
    assert!(result.price.is_none());
}

#[test]
fn thousands_separators_are_removed() {
    let result = extract(
        "https://shop.example.com/tv",
        r#"<h1>Big TV</h1><span itemprop="price">$1,299.00</span>"#,
    );
    assert_eq!(result.price.as_deref(), Some("1299.00"));
}

#[test]
fn main_content_scan_recovers_unlabelled_price() {
    let result = extract(
        "https://www.amazon.com/dp/B000TEST",
        r#"<div id="centerCol"><div>Standard shipping cost $6.99</div><div>Now $42.00</div></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("42.00"));
}

#[test]
fn main_content_attribute_patterns_run_before_the_scan() {
    let result = extract(
        "https://www.target.com/p/acme/-/A-1",
        r#"<div data-test="product-details"><p>Was $30.00 last week</p><span id="offer-price-now">$21.50</span></div>"#,
    );
    assert_eq!(result.price.as_deref(), Some("21.50"));
}

#[test]
fn availability_requires_explicit_wording() {
    let out = extract(
        "https://www.amazon.com/dp/B000TEST",
        r#"<div id="availability"><span>Currently unavailable.</span></div>"#,
    );
    assert_eq!(out.availability, Availability::OutOfStock);

    let in_stock = extract(
        "https://www.amazon.com/dp/B000TEST",
        r#"<div id="availability"><span>Only 2 left - order soon.</span></div>"#,
    );
    assert_eq!(in_stock.availability, Availability::InStock);
}

#[test]
fn images_are_filtered_ranked_and_deduplicated() {
    let page = RenderedPage {
        images: Some(vec![
            image("https://cdn.test/logo.png", "", 400.0, 400.0),
            image("https://cdn.test/sprite-sheet.png", "", 800.0, 800.0),
            image("https://cdn.test/badge.png", "Store icon", 300.0, 300.0),
            image("https://cdn.test/thumb.jpg", "", 90.0, 400.0),
            image("https://cdn.test/side.jpg", "Side", 300.0, 300.0),
            image("https://cdn.test/front.jpg", "Front", 600.0, 500.0),
            image("https://cdn.test/side.jpg", "Side again", 300.0, 300.0),
        ]),
        ..RenderedPage::from_markup("https://shop.example.com/x", "<h1>Acme Widget</h1>")
    };
    let result = extract_fields(&page, &RetailerRegistry::builtin(), PriceBounds::default());
    assert_eq!(
        result.all_images,
        vec![
            "https://cdn.test/front.jpg".to_string(),
            "https://cdn.test/side.jpg".to_string()
        ]
    );
    assert_eq!(result.image.as_deref(), Some("https://cdn.test/front.jpg"));
}

#[test]
fn images_are_capped_at_ten() {
    let images = (1..=12)
        .map(|i| image(&format!("https://cdn.test/{i}.jpg"), "", 200.0 + f64::from(i), 200.0))
        .collect();
    let page = RenderedPage {
        images: Some(images),
        ..RenderedPage::from_markup("https://shop.example.com/x", "")
    };
    let result = extract_fields(&page, &RetailerRegistry::builtin(), PriceBounds::default());
    assert_eq!(result.all_images.len(), 10);
    assert_eq!(result.all_images[0], "https://cdn.test/12.jpg");
}

#[test]
fn main_image_selector_wins_over_largest_image() {
    let page = RenderedPage {
        images: Some(vec![image("https://cdn.test/hero.jpg", "", 1200.0, 800.0)]),
        ..RenderedPage::from_markup(
            "https://www.amazon.com/dp/B000TEST",
            r#"<img id="landingImage" src="https://cdn.test/product.jpg">"#,
        )
    };
    let result = extract_fields(&page, &RetailerRegistry::builtin(), PriceBounds::default());
    assert_eq!(result.image.as_deref(), Some("https://cdn.test/product.jpg"));
    assert_eq!(result.all_images, vec!["https://cdn.test/hero.jpg".to_string()]);
}

#[test]
fn description_prefers_known_containers() {
    let long = "x".repeat(6_000);
    let result = extract(
        "https://www.amazon.com/dp/B000TEST",
        &format!(r#"<div id="productDescription">{long}</div><p>footer</p>"#),
    );
    assert_eq!(result.description.chars().count(), 5_000);
}

#[test]
fn description_falls_back_to_body_text() {
    let page = RenderedPage {
        body_text: Some(format!("Acme Widget\n{}", "y".repeat(12_000))),
        ..RenderedPage::from_markup("https://shop.example.com/x", "<h1>Acme Widget</h1>")
    };
    let result = extract_fields(&page, &RetailerRegistry::builtin(), PriceBounds::default());
    assert!(result.description.starts_with("Acme Widget\n"));
    assert_eq!(result.description.chars().count(), 10_000);
}

#[test]
fn extraction_is_idempotent() {
    let page = RenderedPage::from_markup(
        "https://www.walmart.com/ip/123",
        r#"<html><body><h1 itemprop="name">Acme Widget</h1><span itemprop="price" content="19.99">$19.99</span>
           <img src="/a.jpg" width="500" height="500"></body></html>"#,
    );
    let registry = RetailerRegistry::builtin();
    let first = extract_fields(&page, &registry, PriceBounds::default());
    let second = extract_fields(&page, &registry, PriceBounds::default());
    assert_eq!(first, second);
    assert_eq!(first.all_images, vec!["https://www.walmart.com/a.jpg".to_string()]);
}

#[test]
fn truncate_chars_respects_multibyte_text() {
    assert_eq!(truncate_chars("  héllo wörld  ", 5), "héllo");
}
